//! Block-level transport seam.

use crate::Result;

/// Raw report I/O with the keyboard.
///
/// Implementations only move fixed-size blocks. Framing, retries and
/// reassembly live above this trait.
pub trait ReportDevice: Send {
    /// Write one block. `block[0]` carries the report id.
    fn send_report(&mut self, block: &[u8]) -> Result<()>;

    /// Read one block for `report_id`, without the report id prefix.
    /// An all-zero block means the device has nothing to say yet.
    fn get_report(&mut self, report_id: u8) -> Result<Vec<u8>>;

    /// Release the device. Called once when the session is closed.
    fn close(&mut self) {}
}

impl<D: ReportDevice + ?Sized> ReportDevice for Box<D> {
    fn send_report(&mut self, block: &[u8]) -> Result<()> {
        (**self).send_report(block)
    }

    fn get_report(&mut self, report_id: u8) -> Result<Vec<u8>> {
        (**self).get_report(report_id)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<D: ReportDevice + ?Sized> ReportDevice for &mut D {
    fn send_report(&mut self, block: &[u8]) -> Result<()> {
        (**self).send_report(block)
    }

    fn get_report(&mut self, report_id: u8) -> Result<Vec<u8>> {
        (**self).get_report(report_id)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
