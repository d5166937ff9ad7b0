//! Error type shared by the protocol, transport and transaction layers.

use std::fmt;

/// Protocol step of a lighting transaction, used to tag errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Selecting a key and clearing its staged appearance
    Begin(u8),
    /// Staging the idle appearance of a key
    Idle(u8),
    /// Staging the active (pressed) appearance of a key
    Active(u8),
    /// Applying every staged key at once
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Begin(id) => write!(f, "begin (key {id:#04x})"),
            Stage::Idle(id) => write!(f, "idle stage (key {id:#04x})"),
            Stage::Active(id) => write!(f, "active stage (key {id:#04x})"),
            Stage::Commit => f.write_str("commit"),
        }
    }
}

/// Errors that can occur while talking to the keyboard
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    /// Encoded frame is not a whole number of transport chunks
    #[error("invalid frame length: {0} bytes is not a multiple of the chunk size")]
    InvalidFrameLength(usize),

    /// Length byte of a received frame is too small to hold a command
    #[error("invalid declared frame length: {0:#04x}")]
    InvalidDeclaredLength(u8),

    /// Frame is shorter than its length byte claims
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    /// Parity trailer does not match the frame contents
    #[error("parity mismatch: got {got:#04x}, want {want:#04x}")]
    ParityMismatch { got: u8, want: u8 },

    /// Payload does not fit into a single length byte
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Key id outside the addressable LED range
    #[error("invalid key id: {0}")]
    InvalidKeyId(u8),

    /// Device was not found
    #[error("device not found")]
    DeviceNotFound,

    /// Session was closed, or never opened
    #[error("connection to keyboard not open")]
    NotOpen,

    /// Device kept answering with empty reports until the retry budget ran out
    #[error("no response from device after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// A transaction stage failed
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<KeyboardError>,
    },

    /// Transport failure reported by a non-hidapi backend
    #[error("transport error: {0}")]
    Transport(String),

    /// HID communication error
    #[error("hid error: {0}")]
    Hid(#[from] hidapi::HidError),
}

impl KeyboardError {
    /// Tag an error with the transaction stage it came from
    pub fn at(self, stage: Stage) -> Self {
        KeyboardError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The underlying error, with any stage tags removed
    pub fn root(&self) -> &KeyboardError {
        match self {
            KeyboardError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the device simply did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), KeyboardError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, KeyboardError>;
