use thiserror::Error;

use crate::arena::TimerId;

/// Errors returned by timer and registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("interval must be non-negative, got {0}s")]
    NegativeInterval(i64),

    #[error("unknown or destroyed timer {0}")]
    UnknownTimer(TimerId),
}
