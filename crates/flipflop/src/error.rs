//! Error types for the flipflop crate
//!
//! Mutating operations never return errors: an out-of-range index panics and
//! a call under a finished context is silently dropped. The errors below only
//! surface from configuration, telemetry setup and `Machine::run` misuse.

use thiserror::Error;

/// Errors raised while building or starting a machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlipFlopError {
    #[error("Channel capacity must be at least 1")]
    ZeroChannelCapacity,

    #[error("Condition index out of range: {index} >= {max}")]
    IndexOutOfRange { index: usize, max: usize },

    #[error("Dispatch loop already started")]
    AlreadyRunning,

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),
}

/// Why a [`Context`](crate::Context) is done
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
