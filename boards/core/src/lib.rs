//! Core types for das-keys.
//!
//! This crate provides:
//! - `KeyboardError`, the error type of every keyboard operation
//! - The `ReportDevice` trait, the block-level transport seam
//! - `RetryPolicy` and `Attempt` for retrying transient read conditions
//! - `CancelToken` for aborting a transaction from another thread

mod cancel;
mod error;
mod retry;
mod transport;

pub use cancel::CancelToken;
pub use error::{KeyboardError, Result, Stage};
pub use retry::{Attempt, RetryPolicy};
pub use transport::ReportDevice;
