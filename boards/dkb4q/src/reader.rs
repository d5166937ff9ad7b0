//! Reading acknowledgement frames back from the keyboard.
//!
//! The device answers with fixed size blocks. An all-zero block means it has
//! nothing to say yet, so reads of such blocks are retried. A logical frame
//! may span several blocks, and one block may carry several frames.

use das_core::{Attempt, CancelToken, KeyboardError, ReportDevice, Result, RetryPolicy};
use tracing::debug;

use crate::consts::REPORT_ID;
use crate::frame::{is_zero, Frame, HEADER_SIZE, MIN_DECLARED_LEN};

/// Perform one block read and classify it
pub fn read_block<D: ReportDevice + ?Sized>(dev: &mut D) -> Attempt<Vec<u8>> {
    match dev.get_report(REPORT_ID) {
        Ok(block) if is_zero(&block) => Attempt::Retry,
        Ok(block) => {
            debug!("<- {block:02X?}");
            Attempt::Ok(block)
        },
        Err(e) => Attempt::Abort(e),
    }
}

/// Read one non-empty block, retrying empty ones under `policy`
pub fn read_one<D: ReportDevice + ?Sized>(
    dev: &mut D,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    policy.run(cancel, || read_block(dev))
}

/// Read frames until the device has nothing more buffered.
///
/// Blocks are accumulated until a whole frame is available, then the frame
/// is consumed. Reading stops once everything left over is zero padding.
pub fn read_frames<D: ReportDevice + ?Sized>(
    dev: &mut D,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<Vec<Frame>> {
    let mut buf: Vec<u8> = Vec::new();
    let mut frames = Vec::new();

    loop {
        while buf.len() < HEADER_SIZE {
            buf.extend(read_one(dev, policy, cancel)?);
        }

        let length = buf[1];
        if length < MIN_DECLARED_LEN {
            return Err(KeyboardError::InvalidDeclaredLength(length));
        }

        let end = HEADER_SIZE + length as usize;
        while buf.len() < end {
            buf.extend(read_one(dev, policy, cancel)?);
        }

        let frame = Frame::decode(&buf[..end])?;
        debug!(kind = frame.kind, payload = ?frame.payload, "received frame");
        frames.push(frame);
        buf.drain(..end);

        if is_zero(&buf) {
            return Ok(frames);
        }
    }
}
