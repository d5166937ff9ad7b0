//! High level hidapi abstraction for programming Das Keyboard 4Q key lighting
//!
//! Lighting changes are transactional: every key is staged with a begin,
//! idle and active command, then one commit applies the whole batch.

use das_core::{CancelToken, KeyboardError, ReportDevice, Result, RetryPolicy, Stage};
use tracing::{debug, warn};

pub mod abi;
pub mod discovery;
pub mod frame;
pub mod hid;
pub mod reader;
pub mod types;

#[cfg(test)]
mod fake;

pub use discovery::{DeviceDescriptor, Discovery};
pub use frame::Frame;
pub use hid::HidReportDevice;
pub use types::{ActiveEffect, ActiveKind, EffectParams, IdleEffect, KeyState, Rgb};

pub mod consts {
    pub const VENDOR_ID: u16 = 0x24F0;
    pub const LIGHTING_INTERFACE: i32 = 1;
    pub const REPORT_ID: u8 = 0x01;
    /// Frame kind of commands sent to the keyboard
    pub const HOST_FRAME: u8 = 0xEA;
    /// Frame kind of acknowledgements sent by the keyboard
    pub const DEVICE_FRAME: u8 = 0xED;
    /// Highest addressable LED id
    pub const MAX_LED_ID: u8 = 124;
}

/// Session with one keyboard. Owns the transport until closed.
pub struct Keyboard<D: ReportDevice = HidReportDevice> {
    device: Option<D>,
    retry: RetryPolicy,
}

impl Keyboard {
    /// Find and open the first keyboard on the bus
    pub fn open() -> Result<Self> {
        let device = Discovery::new()?.open_first()?;
        Ok(Self::with_device(device))
    }
}

impl<D: ReportDevice> Keyboard<D> {
    pub fn with_device(device: D) -> Self {
        Self {
            device: Some(device),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the policy used when waiting for acknowledgements
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Release the device. Every later call fails with [`KeyboardError::NotOpen`].
    pub fn close(&mut self) -> Result<()> {
        let mut device = self.device.take().ok_or(KeyboardError::NotOpen)?;
        device.close();
        debug!("closed keyboard");
        Ok(())
    }

    fn device(&mut self) -> Result<&mut D> {
        self.device.as_mut().ok_or(KeyboardError::NotOpen)
    }

    /// Write an encoded frame, one chunk per report
    pub fn send(&mut self, frame: &[u8], cancel: &CancelToken) -> Result<()> {
        if frame.len() % frame::CHUNK_SIZE != 0 {
            return Err(KeyboardError::InvalidFrameLength(frame.len()));
        }
        let device = self.device()?;

        let mut block = [0u8; frame::CHUNK_SIZE + 1];
        block[0] = consts::REPORT_ID;
        for chunk in frame.chunks(frame::CHUNK_SIZE) {
            cancel.check()?;
            block[1..].copy_from_slice(chunk);
            debug!("-> {block:02X?}");
            device.send_report(&block)?;
        }
        Ok(())
    }

    /// Read every frame the keyboard has queued
    pub fn read_frames(&mut self, cancel: &CancelToken) -> Result<Vec<Frame>> {
        let retry = self.retry;
        reader::read_frames(self.device()?, &retry, cancel)
    }

    /// Frame and send a command payload
    fn command(&mut self, payload: &[u8], cancel: &CancelToken) -> Result<()> {
        let frame = frame::encode(consts::HOST_FRAME, payload)?;
        self.send(&frame, cancel)
    }

    /// Read the acknowledgement of the last command
    fn acknowledge(&mut self, cancel: &CancelToken) -> Result<Vec<Frame>> {
        let frames = self.read_frames(cancel)?;
        for frame in &frames {
            if frame.kind != consts::DEVICE_FRAME {
                warn!(kind = frame.kind, "unexpected acknowledgement kind");
            }
        }
        Ok(frames)
    }

    /// Read an acknowledgement the keyboard does not always send
    fn acknowledge_optional(&mut self, stage: Stage, cancel: &CancelToken) -> Result<()> {
        match self.acknowledge(cancel) {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => {
                warn!("no acknowledgement for {stage}, continuing");
                Ok(())
            },
            Err(e) => Err(e.at(stage)),
        }
    }

    /// Stage the appearance of one key without applying it
    pub fn stage(&mut self, state: &KeyState, cancel: &CancelToken) -> Result<()> {
        let id = state.id;
        if !state.is_valid() {
            return Err(KeyboardError::InvalidKeyId(id));
        }
        debug!(id, ?state, "staging key");

        self.command(&abi::begin(id), cancel)
            .map_err(|e| e.at(Stage::Begin(id)))?;
        self.acknowledge_optional(Stage::Begin(id), cancel)?;

        self.command(
            &abi::idle(id, state.idle_effect, state.idle_color),
            cancel,
        )
        .map_err(|e| e.at(Stage::Idle(id)))?;

        let active = state.active_effect;
        self.command(
            &abi::active(id, active.kind(), state.active_color, active.params()),
            cancel,
        )
        .map_err(|e| e.at(Stage::Active(id)))?;
        self.acknowledge_optional(Stage::Active(id), cancel)
    }

    /// Apply everything staged since the last commit
    pub fn commit(&mut self, cancel: &CancelToken) -> Result<()> {
        self.command(&abi::commit(), cancel)
            .map_err(|e| e.at(Stage::Commit))?;
        self.acknowledge(cancel).map_err(|e| e.at(Stage::Commit))?;
        debug!("committed staged keys");
        Ok(())
    }

    /// Set the appearance of one or more keys in a single transaction.
    ///
    /// Every id is validated before anything is written. The commit is only
    /// sent once all keys were staged. Staging many keys in one call is
    /// cheaper than calling this repeatedly.
    pub fn set_state(&mut self, states: &[KeyState], cancel: &CancelToken) -> Result<()> {
        self.device()?;
        if let Some(bad) = states.iter().find(|s| !s.is_valid()) {
            return Err(KeyboardError::InvalidKeyId(bad.id));
        }

        for state in states {
            self.stage(state, cancel)?;
        }
        self.commit(cancel)
    }
}

impl<D: ReportDevice> Drop for Keyboard<D> {
    fn drop(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fake::FakeDevice;

    const ACK: [u8; 8] = [0xED, 0x03, 0x78, 0x00, 0x96, 0, 0, 0];

    const BEGIN: [[u8; 8]; 2] = [
        [1, 0xEA, 0x0B, 0x78, 0x03, 0x05, 0x00, 0x00],
        [1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9F, 0],
    ];
    const IDLE: [[u8; 8]; 2] = [
        [1, 0xEA, 0x08, 0x78, 0x08, 0x05, 0x01, 0xFB],
        [1, 0x02, 0x03, 0x6C, 0, 0, 0, 0],
    ];
    const COMMIT: [u8; 8] = [1, 0xEA, 0x03, 0x78, 0x0A, 0x9B, 0, 0];

    fn keyboard(dev: &mut FakeDevice) -> Keyboard<&mut FakeDevice> {
        Keyboard::with_device(dev).with_retry(RetryPolicy::immediate(3))
    }

    fn key(active: ActiveEffect) -> KeyState {
        KeyState::solid(0x05, Rgb::new(0xFB, 0x02, 0x03))
            .active(active, Rgb::new(0xFC, 0xFD, 0xFE))
    }

    fn expected(active: [[u8; 8]; 2]) -> Vec<Vec<u8>> {
        [BEGIN[0], BEGIN[1], IDLE[0], IDLE[1], active[0], active[1], COMMIT]
            .iter()
            .map(|b| b.to_vec())
            .collect()
    }

    fn run(state: KeyState, active: [[u8; 8]; 2]) {
        let mut dev = FakeDevice::default();
        for _ in 0..3 {
            dev.expect_get(&ACK);
        }
        keyboard(&mut dev)
            .set_state(&[state], &CancelToken::new())
            .unwrap();
        assert_eq!(dev.sent, expected(active));
        dev.assert_done();
        assert!(dev.closed);
    }

    #[test]
    fn set_color_and_none() {
        let state = KeyState::solid(0x05, Rgb::new(0xFB, 0x02, 0x03));
        run(
            state,
            [
                [1, 0xEA, 0x0B, 0x78, 0x04, 0x05, 0x00, 0x00],
                [1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x98, 0],
            ],
        );
    }

    #[test]
    fn set_color_and_set_color() {
        let active = ActiveEffect::set_color().with_duration(Duration::from_secs(4));
        run(
            key(active),
            [
                [1, 0xEA, 0x0B, 0x78, 0x04, 0x05, 0x1E, 0xFC],
                [1, 0xFD, 0xFE, 0x0F, 0xD0, 0x00, 0xA6, 0],
            ],
        );
    }

    #[test]
    fn set_color_and_blink() {
        let active = ActiveEffect::blink()
            .with_cycle_count(2)
            .with_cycle_duration(Duration::from_secs(2));
        run(
            key(active),
            [
                [1, 0xEA, 0x0B, 0x78, 0x04, 0x05, 0x1F, 0xFC],
                [1, 0xFD, 0xFE, 0x03, 0xB8, 0x02, 0xC1, 0],
            ],
        );
    }

    #[test]
    fn commits_once_per_batch() {
        let mut dev = FakeDevice::default();
        for _ in 0..5 {
            dev.expect_get(&ACK);
        }
        let states = [
            KeyState::solid(1, Rgb::new(1, 1, 1)),
            KeyState::solid(2, Rgb::new(2, 2, 2)),
        ];
        keyboard(&mut dev)
            .set_state(&states, &CancelToken::new())
            .unwrap();

        assert_eq!(dev.sent.len(), 2 * 6 + 1);
        assert_eq!(dev.sent.iter().filter(|b| **b == COMMIT).count(), 1);
        assert_eq!(dev.sent.last().unwrap(), &COMMIT.to_vec());
        // key 2 is only selected after key 1 was fully staged
        assert_eq!(dev.sent[6][5], 2);
        assert_eq!(dev.sent[6][4], 0x03);
    }

    #[test]
    fn empty_batch_only_commits() {
        let mut dev = FakeDevice::default();
        dev.expect_get(&ACK);
        keyboard(&mut dev).set_state(&[], &CancelToken::new()).unwrap();
        assert_eq!(dev.sent, vec![COMMIT.to_vec()]);
    }

    #[test]
    fn missing_stage_acknowledgement_is_tolerated() {
        let mut dev = FakeDevice::default();
        dev.expect_empty(3);
        dev.expect_empty(3);
        dev.expect_get(&ACK);
        keyboard(&mut dev)
            .set_state(&[KeyState::solid(5, Rgb::BLACK)], &CancelToken::new())
            .unwrap();
        assert_eq!(dev.sent.last().unwrap(), &COMMIT.to_vec());
        dev.assert_done();
    }

    #[test]
    fn missing_commit_acknowledgement_fails() {
        let mut dev = FakeDevice::default();
        dev.expect_get(&ACK);
        dev.expect_get(&ACK);
        dev.expect_empty(3);
        let err = keyboard(&mut dev)
            .set_state(&[KeyState::solid(5, Rgb::BLACK)], &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            KeyboardError::Stage { stage: Stage::Commit, .. }
        ));
        assert!(err.is_timeout());
    }

    #[test]
    fn corrupt_stage_acknowledgement_aborts_before_commit() {
        let mut dev = FakeDevice::default();
        dev.expect_get(&[0xED, 0x03, 0x78, 0x00, 0xEE, 0, 0, 0]);
        let err = keyboard(&mut dev)
            .set_state(&[KeyState::solid(5, Rgb::BLACK)], &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            KeyboardError::Stage { stage: Stage::Begin(5), .. }
        ));
        assert!(matches!(err.root(), KeyboardError::ParityMismatch { .. }));
        assert_eq!(dev.sent, BEGIN.iter().map(|b| b.to_vec()).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_key_id_writes_nothing() {
        let mut dev = FakeDevice::default();
        let states = [
            KeyState::solid(1, Rgb::BLACK),
            KeyState::solid(consts::MAX_LED_ID + 1, Rgb::BLACK),
        ];
        let err = keyboard(&mut dev)
            .set_state(&states, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, KeyboardError::InvalidKeyId(125)));
        assert!(dev.sent.is_empty());
    }

    #[test]
    fn closed_keyboard_is_not_open() {
        let mut dev = FakeDevice::default();
        let mut kb = keyboard(&mut dev);
        assert!(kb.is_open());
        kb.close().unwrap();
        assert!(!kb.is_open());
        assert!(matches!(kb.close(), Err(KeyboardError::NotOpen)));
        assert!(matches!(
            kb.set_state(&[KeyState::solid(1, Rgb::BLACK)], &CancelToken::new()),
            Err(KeyboardError::NotOpen)
        ));
        assert!(matches!(
            kb.read_frames(&CancelToken::new()),
            Err(KeyboardError::NotOpen)
        ));
        drop(kb);
        assert!(dev.closed);
        assert!(dev.sent.is_empty());
    }

    #[test]
    fn cancelled_before_send() {
        let mut dev = FakeDevice::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = keyboard(&mut dev)
            .set_state(&[KeyState::solid(1, Rgb::BLACK)], &cancel)
            .unwrap_err();
        assert!(matches!(err.root(), KeyboardError::Cancelled));
        assert!(dev.sent.is_empty());
    }

    #[test]
    fn send_rejects_partial_chunks() {
        let mut dev = FakeDevice::default();
        let res = keyboard(&mut dev).send(&[0xEA, 0x03, 0x78], &CancelToken::new());
        assert!(matches!(res, Err(KeyboardError::InvalidFrameLength(3))));
    }

    #[test]
    fn unexpected_ack_kind_is_accepted() {
        let mut dev = FakeDevice::default();
        // kind 0xEE, parity adjusted
        dev.expect_get(&[0xEE, 0x03, 0x78, 0x00, 0x95, 0, 0, 0]);
        let frames = keyboard(&mut dev).acknowledge(&CancelToken::new()).unwrap();
        assert_eq!(frames, vec![Frame::new(0xEE, [0x78, 0x00])]);
    }
}
