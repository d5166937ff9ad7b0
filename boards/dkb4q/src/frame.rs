//! Length and parity framed messages.
//!
//! ```text
//! +------+--------+-----------------------+--------+-------------+
//! | kind | length | payload               | parity | zero pad    |
//! | 1    | 1      | length - 1            | 1      | to 7n bytes |
//! +------+--------+-----------------------+--------+-------------+
//! ```
//!
//! `length` counts the payload plus the parity byte. `parity` is the XOR of
//! every byte before it.

use das_core::{KeyboardError, Result};

/// Content bytes carried by one transport block
pub const CHUNK_SIZE: usize = 7;

/// Size of the `kind` and `length` header
pub const HEADER_SIZE: usize = 2;

/// Smallest length byte a received frame may declare
pub const MIN_DECLARED_LEN: u8 = 2;

/// Largest payload whose length still fits into the length byte
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

/// A decoded logical message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Value of the length byte on the wire
    pub fn declared_len(&self) -> u8 {
        (self.payload.len() + 1) as u8
    }

    /// Parity trailer on the wire
    pub fn parity(&self) -> u8 {
        self.kind ^ self.declared_len() ^ xor_all(&self.payload)
    }

    /// Unpadded wire bytes: kind, length, payload, parity
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len() + 1);
        buf.push(self.kind);
        buf.push(self.declared_len());
        buf.extend_from_slice(&self.payload);
        buf.push(self.parity());
        buf
    }

    /// Decode one frame from the start of `data`. Trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(KeyboardError::TruncatedFrame {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let kind = data[0];
        let length = data[1];
        if length < MIN_DECLARED_LEN {
            return Err(KeyboardError::InvalidDeclaredLength(length));
        }

        let end = HEADER_SIZE + length as usize;
        if data.len() < end {
            return Err(KeyboardError::TruncatedFrame {
                expected: end,
                actual: data.len(),
            });
        }

        let got = data[end - 1];
        let want = xor_all(&data[..end - 1]);
        if got != want {
            return Err(KeyboardError::ParityMismatch { got, want });
        }

        Ok(Self {
            kind,
            payload: data[HEADER_SIZE..end - 1].to_vec(),
        })
    }
}

/// Encode a frame, zero padded to a whole number of chunks
pub fn encode(kind: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(KeyboardError::PayloadTooLarge(payload.len()));
    }

    let enc_len = HEADER_SIZE + payload.len() + 1;
    let buf_len = enc_len.div_ceil(CHUNK_SIZE) * CHUNK_SIZE;

    let mut buf = vec![0u8; buf_len];
    buf[0] = kind;
    buf[1] = (enc_len - HEADER_SIZE) as u8;
    buf[HEADER_SIZE..enc_len - 1].copy_from_slice(payload);
    buf[enc_len - 1] = xor_all(&buf[..enc_len - 1]);

    Ok(buf)
}

/// XOR of every byte
pub fn xor_all(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// True if `data` is empty or only contains zero bytes
pub fn is_zero(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encode_commit() {
        assert_eq!(
            encode(0xEA, &[0x78, 0x0A]).unwrap(),
            [0xEA, 0x03, 0x78, 0x0A, 0x9B, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_idle_stage() {
        assert_eq!(
            encode(0xEA, &[0x78, 0x08, 0x05, 0x01, 0x60, 0x61, 0x62]).unwrap(),
            [0xEA, 0x08, 0x78, 0x08, 0x05, 0x01, 0x60, 0x61, 0x62, 0xF5, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_begin_and_active() {
        assert_eq!(
            encode(0xEA, &[0x78, 0x03, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap(),
            [0xEA, 0x0B, 0x78, 0x03, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9F, 0x00]
        );
        assert_eq!(
            encode(0xEA, &[0x78, 0x04, 0x05, 0x1E, 0xFE, 0x01, 0x02, 0x07, 0xD0, 0x00]).unwrap(),
            [0xEA, 0x0B, 0x78, 0x04, 0x05, 0x1E, 0xFE, 0x01, 0x02, 0x07, 0xD0, 0x00, 0xAC, 0x00]
        );
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![1u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            encode(0xEA, &payload),
            Err(KeyboardError::PayloadTooLarge(255))
        ));
        assert!(encode(0xEA, &payload[1..]).is_ok());
    }

    #[test]
    fn decode_ack() {
        let frame = Frame::decode(&[0xED, 0x03, 0x78, 0x00, 0x96, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(frame, Frame::new(0xED, [0x78, 0x00]));
        assert_eq!(frame.to_bytes(), [0xED, 0x03, 0x78, 0x00, 0x96]);
    }

    #[test]
    fn decode_bad_parity() {
        let res = Frame::decode(&[0xED, 0x03, 0x78, 0x00, 0xEE, 0x00, 0x00, 0x00]);
        assert!(matches!(
            res,
            Err(KeyboardError::ParityMismatch { got: 0xEE, want: 0x96 })
        ));
    }

    #[test]
    fn decode_bad_length() {
        let res = Frame::decode(&[0xED, 0x00, 0x78, 0x00, 0x95, 0x00, 0x00, 0x00]);
        assert!(matches!(res, Err(KeyboardError::InvalidDeclaredLength(0))));
        let res = Frame::decode(&[0xED, 0x01, 0xEC]);
        assert!(matches!(res, Err(KeyboardError::InvalidDeclaredLength(1))));
    }

    #[test]
    fn decode_truncated() {
        let res = Frame::decode(&[0xED, 0x03, 0x78]);
        assert!(matches!(
            res,
            Err(KeyboardError::TruncatedFrame { expected: 5, actual: 3 })
        ));
        assert!(matches!(
            Frame::decode(&[0xED]),
            Err(KeyboardError::TruncatedFrame { expected: 2, actual: 1 })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip(kind in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 1..=10)) {
            let encoded = encode(kind, &payload).unwrap();
            prop_assert_eq!(encoded.len() % CHUNK_SIZE, 0);
            prop_assert_eq!(Frame::decode(&encoded).unwrap(), Frame::new(kind, payload));
        }

        #[test]
        fn parity_is_xor_of_preceding_bytes(kind in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..=10)) {
            let encoded = encode(kind, &payload).unwrap();
            let end = HEADER_SIZE + payload.len() + 1;
            prop_assert_eq!(encoded[end - 1], xor_all(&encoded[..end - 1]));
            prop_assert!(is_zero(&encoded[end..]));
        }
    }
}
