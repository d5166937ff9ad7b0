//! Bounded retry executor.
//!
//! An operation reports each attempt as an [`Attempt`]: a value, a transient
//! "try again", or a fatal error. Only `Retry` is ever repeated.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{CancelToken, KeyboardError, Result};

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// Attempt succeeded
    Ok(T),
    /// Nothing to report yet, try again after a backoff
    Retry,
    /// Fatal failure, stop immediately
    Abort(KeyboardError),
}

impl<T> From<Result<T>> for Attempt<T> {
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(v) => Attempt::Ok(v),
            Err(e) => Attempt::Abort(e),
        }
    }
}

/// Limits for retrying a transient condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub attempts: u32,
    /// Wait after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for the doubling backoff
    pub max_backoff: Duration,
    /// Total time budget, checked before each new attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(100),
            timeout: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with no backoff between attempts
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            timeout: Duration::MAX,
        }
    }

    /// Run `op` until it returns a value or a fatal error, or the policy is exhausted.
    ///
    /// `cancel` is checked before every attempt and interrupts the backoff.
    pub fn run<T>(&self, cancel: &CancelToken, mut op: impl FnMut() -> Attempt<T>) -> Result<T> {
        let start = Instant::now();
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        while attempt < self.attempts.max(1) {
            cancel.check()?;
            attempt += 1;

            match op() {
                Attempt::Ok(v) => return Ok(v),
                Attempt::Abort(e) => return Err(e),
                Attempt::Retry => debug!(attempt, "no data yet, retrying"),
            }

            if attempt >= self.attempts || start.elapsed() + backoff >= self.timeout {
                break;
            }
            if cancel.wait(backoff) {
                return Err(KeyboardError::Cancelled);
            }
            backoff = (backoff * 2).min(self.max_backoff);
        }

        Err(KeyboardError::Timeout { attempts: attempt })
    }
}
