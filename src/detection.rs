//! Keyboard detection and selection logic.

use std::ffi::CString;

use bpaf::Bpaf;
use das_core::{KeyboardError, Result};
use dkb4q::{Discovery, HidReportDevice};

/// Which keyboard to talk to
#[derive(Clone, Debug, Default, PartialEq, Eq, Bpaf)]
#[bpaf(fallback(DeviceSelector::Auto), group_help("Device selection:"))]
pub enum DeviceSelector {
    /// Use the first connected keyboard (default)
    #[default]
    #[bpaf(long("auto"))]
    Auto,
    Path(
        /// Open the keyboard at this HID path, as printed by `list`
        #[bpaf(long("path"), argument("PATH"))]
        String,
    ),
}

impl DeviceSelector {
    /// Open the selected keyboard
    pub fn open(&self, discovery: &Discovery) -> Result<HidReportDevice> {
        match self {
            DeviceSelector::Auto => discovery.open_first(),
            DeviceSelector::Path(path) => {
                let path = CString::new(path.as_str())
                    .map_err(|_| KeyboardError::Transport(format!("invalid device path: {path}")))?;
                let device = discovery
                    .devices()
                    .find(|d| d.path == path)
                    .ok_or(KeyboardError::DeviceNotFound)?;
                discovery.open(&device)
            },
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Path(path) => write!(f, "{path}"),
        }
    }
}
