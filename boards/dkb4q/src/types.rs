use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::abi::Arg;
use crate::consts::MAX_LED_ID;

/// 24-bit key color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `factor` (clamped to 0.0..=1.0)
    pub fn scale(self, factor: f64) -> Self {
        let f = factor.clamp(0.0, 1.0);
        let ch = |c: u8| (c as f64 * f + 0.5) as u8;
        Self::new(ch(self.r), ch(self.g), ch(self.b))
    }

    /// Channel-wise saturating sum
    pub fn mix(self, other: Rgb) -> Self {
        Self::new(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let mut hex = code.trim_start_matches('#').to_string();
        match hex.len() {
            3 => hex = hex.chars().flat_map(|a| [a, a]).collect(),
            6 => {},
            l => return Err(format!("invalid hex length for {code}: {l}")),
        }
        let value = u32::from_str_radix(&hex, 16).map_err(|_| format!("invalid hex color: {code}"))?;
        Ok(Self::new(
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        ))
    }
}

impl Arg for Rgb {
    const SIZE: usize = 3;
    fn to_bytes(&self) -> Vec<u8> {
        vec![self.r, self.g, self.b]
    }
}

/// Behavior of a key while it is not pressed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdleEffect {
    /// Steadily light the key in a single color
    #[default]
    SetColor = 0x01,
    /// Cycle through phases of high and low intensity
    Breathe = 0x08,
    /// Cycle through the colors of the rainbow
    ColorCycle = 0x14,
    /// Turn the light on and off at regular intervals
    Blink = 0x1F,
}

impl IdleEffect {
    pub const OPTIONS: &'static str = "[ set-color, breathe, blink, color-cycle ]";
}

impl FromStr for IdleEffect {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "set-color" | "color" => Ok(Self::SetColor),
            "breathe" => Ok(Self::Breathe),
            "blink" => Ok(Self::Blink),
            "color-cycle" | "cycle" => Ok(Self::ColorCycle),
            _ => Err(format!(
                "invalid idle effect, must be one of: {}",
                Self::OPTIONS
            )),
        }
    }
}

impl Arg for IdleEffect {
    const SIZE: usize = 1;
    #[inline(always)]
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// Kind of reaction to a key press
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActiveKind {
    /// Do not react to key presses
    #[default]
    None = 0x00,
    /// Breathe when pressed
    Breathe = 0x08,
    /// Light up in a single color, then revert to the idle state
    SetColor = 0x1E,
    /// Blink when pressed
    Blink = 0x1F,
}

impl FromStr for ActiveKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "set-color" | "color" => Ok(Self::SetColor),
            "blink" => Ok(Self::Blink),
            "breathe" => Ok(Self::Breathe),
            _ => Err("invalid active effect, must be one of: [ none, set-color, blink, breathe ]".into()),
        }
    }
}

impl Arg for ActiveKind {
    const SIZE: usize = 1;
    #[inline(always)]
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// Effect specific parameter bytes of an active effect
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EffectParams(pub [u8; 3]);

impl Arg for EffectParams {
    const SIZE: usize = 3;
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Unit of [`ActiveEffect::with_duration`], one step is 270ms
const DURATION_STEP: Duration = Duration::from_millis(270);

/// Unit of [`ActiveEffect::with_cycle_duration`]. The default of 500 steps is 1.05s.
const CYCLE_STEP: Duration = Duration::from_micros(2100);

/// Round `d` to the nearest multiple of `step`, half away from zero
fn steps(d: Duration, step: Duration) -> u128 {
    let step = step.as_nanos();
    (d.as_nanos() + step / 2) / step
}

/// Behavior of a key after it has been pressed.
///
/// Build one with a named constructor and refine it with the `with_*`
/// modifiers. A modifier that does not apply to the effect, or whose value
/// can not be represented, returns the effect unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ActiveEffect {
    kind: ActiveKind,
    params: EffectParams,
}

impl ActiveEffect {
    /// The key does not react to key presses
    pub const fn none() -> Self {
        Self {
            kind: ActiveKind::None,
            params: EffectParams([0x00, 0x00, 0x00]),
        }
    }

    /// Light the key in a single color. After some time (default 1.9s) the
    /// key reverts to its idle state.
    pub const fn set_color() -> Self {
        Self {
            kind: ActiveKind::SetColor,
            params: EffectParams([0x07, 0xD0, 0x00]),
        }
    }

    /// Blink when pressed. Tune with [`Self::with_cycle_count`] and
    /// [`Self::with_cycle_duration`].
    pub const fn blink() -> Self {
        Self {
            kind: ActiveKind::Blink,
            params: EffectParams([0x01, 0xF4, 0x03]),
        }
    }

    /// Breathe when pressed. Tune with [`Self::with_cycle_count`].
    pub const fn breathe() -> Self {
        Self {
            kind: ActiveKind::Breathe,
            params: EffectParams([0x03, 0xE8, 0x03]),
        }
    }

    /// Default descriptor for an effect kind
    pub const fn from_kind(kind: ActiveKind) -> Self {
        match kind {
            ActiveKind::None => Self::none(),
            ActiveKind::SetColor => Self::set_color(),
            ActiveKind::Blink => Self::blink(),
            ActiveKind::Breathe => Self::breathe(),
        }
    }

    pub fn kind(&self) -> ActiveKind {
        self.kind
    }

    pub fn params(&self) -> EffectParams {
        self.params
    }

    /// How long `set_color` lasts before reverting to the idle state
    #[must_use]
    pub fn with_duration(mut self, d: Duration) -> Self {
        if self.kind != ActiveKind::SetColor {
            return self;
        }
        if let Ok(value @ 1..=0xFF) = u8::try_from(steps(d, DURATION_STEP)) {
            self.params.0[0] = value;
        }
        self
    }

    /// How often `blink` blinks or `breathe` breathes
    #[must_use]
    pub fn with_cycle_count(mut self, count: u8) -> Self {
        if matches!(self.kind, ActiveKind::Blink | ActiveKind::Breathe) {
            self.params.0[2] = count;
        }
        self
    }

    /// Length of one on/off cycle of `blink`
    #[must_use]
    pub fn with_cycle_duration(mut self, d: Duration) -> Self {
        if self.kind != ActiveKind::Blink {
            return self;
        }
        if let Ok(value @ 1..=0xFFFF) = u16::try_from(steps(d, CYCLE_STEP)) {
            let [hi, lo] = value.to_be_bytes();
            self.params.0[0] = hi;
            self.params.0[1] = lo;
        }
        self
    }
}

/// Desired appearance of one key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyState {
    pub id: u8,
    pub idle_effect: IdleEffect,
    pub idle_color: Rgb,
    pub active_effect: ActiveEffect,
    pub active_color: Rgb,
}

impl KeyState {
    /// A key lit steadily in `color` that does not react to presses
    pub fn solid(id: u8, color: Rgb) -> Self {
        Self {
            id,
            idle_color: color,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn idle(mut self, effect: IdleEffect, color: Rgb) -> Self {
        self.idle_effect = effect;
        self.idle_color = color;
        self
    }

    #[must_use]
    pub fn active(mut self, effect: ActiveEffect, color: Rgb) -> Self {
        self.active_effect = effect;
        self.active_color = color;
        self
    }

    /// Whether the key id is addressable on this keyboard
    pub fn is_valid(&self) -> bool {
        self.id <= MAX_LED_ID
    }
}
