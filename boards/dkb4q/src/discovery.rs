//! Finding Das Keyboard lighting interfaces on the bus.

use std::ffi::CString;
use std::fmt::Display;

use das_core::{KeyboardError, Result};
use hidapi::{DeviceInfo, HidApi};
use tracing::debug;

use crate::consts::{LIGHTING_INTERFACE, VENDOR_ID};
use crate::hid::HidReportDevice;

/// A lighting interface that can be opened
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: CString,
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: i32,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl DeviceDescriptor {
    fn from_info(info: &DeviceInfo) -> Self {
        Self {
            path: info.path().to_owned(),
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            interface: info.interface_number(),
            product: info.product_string().map(str::to_string),
            serial: info.serial_number().map(str::to_string),
        }
    }
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} {} ({})",
            self.vendor_id,
            self.product_id,
            self.product.as_deref().unwrap_or("Das Keyboard"),
            self.path.to_string_lossy(),
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " serial {serial}")?;
        }
        Ok(())
    }
}

/// Check if a HID device is a keyboard lighting interface
fn matches(device: &DeviceInfo) -> bool {
    device.vendor_id() == VENDOR_ID && device.interface_number() == LIGHTING_INTERFACE
}

/// Handle to the HID subsystem
pub struct Discovery {
    api: HidApi,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        Ok(Self { api: HidApi::new()? })
    }

    /// Rescan the bus for plugged or unplugged devices
    pub fn refresh(&mut self) -> Result<()> {
        self.api.refresh_devices()?;
        Ok(())
    }

    /// Every matching lighting interface, in enumeration order.
    /// Each call walks the device list from the start again.
    pub fn devices(&self) -> impl Iterator<Item = DeviceDescriptor> + '_ {
        self.api
            .device_list()
            .filter(|d| matches(d))
            .map(DeviceDescriptor::from_info)
    }

    /// Open a device returned by [`Discovery::devices`]
    pub fn open(&self, device: &DeviceDescriptor) -> Result<HidReportDevice> {
        debug!("opening {device}");
        Ok(HidReportDevice::new(self.api.open_path(&device.path)?))
    }

    /// Open the first matching device that can be opened.
    ///
    /// If devices were found but none could be opened, the last open error
    /// is returned.
    pub fn open_first(&self) -> Result<HidReportDevice> {
        let mut last_err = None;
        for desc in self.devices() {
            match self.open(&desc) {
                Ok(dev) => return Ok(dev),
                Err(e) => {
                    debug!("failed to open {desc}: {e}");
                    last_err = Some(e);
                },
            }
        }
        Err(last_err.unwrap_or(KeyboardError::DeviceNotFound))
    }
}
