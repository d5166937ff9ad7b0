//! hidapi backed transport using feature reports.

use das_core::{ReportDevice, Result};
use hidapi::HidDevice;

use crate::frame::CHUNK_SIZE;

/// Block size on the wire, including the report id
const REPORT_SIZE: usize = CHUNK_SIZE + 1;

/// An opened keyboard lighting interface
pub struct HidReportDevice {
    device: HidDevice,
}

impl HidReportDevice {
    pub fn new(device: HidDevice) -> Self {
        Self { device }
    }
}

impl ReportDevice for HidReportDevice {
    fn send_report(&mut self, block: &[u8]) -> Result<()> {
        self.device.send_feature_report(block)?;
        Ok(())
    }

    fn get_report(&mut self, report_id: u8) -> Result<Vec<u8>> {
        let mut buf = [0u8; REPORT_SIZE + 1];
        buf[0] = report_id;
        let len = self.device.get_feature_report(&mut buf)?;
        // First byte echoes the report id
        Ok(buf[1..len.clamp(1, buf.len())].to_vec())
    }
}
