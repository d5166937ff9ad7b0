//! Scripted in-memory device for tests.

use std::collections::VecDeque;

use das_core::{KeyboardError, ReportDevice, Result};

use crate::consts::REPORT_ID;

#[derive(Debug, Default)]
pub struct FakeDevice {
    /// Every block written, in order
    pub sent: Vec<Vec<u8>>,
    responses: VecDeque<std::result::Result<Vec<u8>, String>>,
    pub closed: bool,
}

impl FakeDevice {
    /// Queue a block for the next read
    pub fn expect_get(&mut self, block: &[u8]) {
        self.responses.push_back(Ok(block.to_vec()));
    }

    /// Queue `n` empty blocks
    pub fn expect_empty(&mut self, n: usize) {
        for _ in 0..n {
            self.expect_get(&[0u8; 8]);
        }
    }

    /// Queue a transport failure for the next read
    pub fn fail_get(&mut self, msg: &str) {
        self.responses.push_back(Err(msg.to_string()));
    }

    pub fn assert_done(&self) {
        assert!(
            self.responses.is_empty(),
            "{} scripted responses left unread",
            self.responses.len()
        );
    }
}

impl ReportDevice for FakeDevice {
    fn send_report(&mut self, block: &[u8]) -> Result<()> {
        if self.closed {
            return Err(KeyboardError::Transport("device is closed".into()));
        }
        self.sent.push(block.to_vec());
        Ok(())
    }

    fn get_report(&mut self, report_id: u8) -> Result<Vec<u8>> {
        if self.closed {
            return Err(KeyboardError::Transport("device is closed".into()));
        }
        if report_id != REPORT_ID {
            return Err(KeyboardError::Transport(format!(
                "report id = {report_id}, want {REPORT_ID}"
            )));
        }
        match self.responses.pop_front() {
            Some(res) => res.map_err(KeyboardError::Transport),
            None => Err(KeyboardError::Transport("unexpected get_report call".into())),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
