//! Payloads of the lighting commands, before framing.

use crate::types::{ActiveKind, EffectParams, IdleEffect, Rgb};

pub trait Arg {
    const SIZE: usize;
    fn to_bytes(&self) -> Vec<u8>;
}

impl Arg for u8 {
    const SIZE: usize = 1;
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self]
    }
}

macro_rules! impl_command_abi {
    [$(
        $( #[doc = $( $doc:tt )* ] )*
        fn $name:ident ( $([ $( $hardcode:expr ),* ]$(,)?)? $( $arg:ident: $type:tt ),* $(; pad $pad:literal)? );
    )+] => {
        $(
            $(#[doc = concat!("Construct a payload for ", $($doc)*)])*
            #[allow(unused_mut)]
            pub fn $name( $( $arg: $type ),* ) -> Vec<u8> {
                let len = const { 0 $($( + $hardcode - $hardcode + 1 )*)? $( + $type::SIZE )* $( + $pad )? };
                let mut buf = Vec::with_capacity(len);
                $($(
                    buf.push($hardcode);
                )*)?
                $(
                    buf.extend_from_slice(&$arg.to_bytes());
                )*
                buf.resize(len, 0);
                buf
            }
        )*
    };
}

impl_command_abi![
    /// selecting a key and clearing its staged appearance
    fn begin([0x78, 0x03], id: u8; pad 7);

    /// staging the idle appearance of a key
    fn idle([0x78, 0x08], id: u8, effect: IdleEffect, color: Rgb);

    /// staging the active appearance of a key
    fn active([0x78, 0x04], id: u8, kind: ActiveKind, color: Rgb, params: EffectParams);

    /// applying every staged key at once
    fn commit([0x78, 0x0A]);
];
