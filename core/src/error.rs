//! Error types for timer construction and scheduling

use thiserror::Error;

/// Errors raised by a [`Clock`](crate::clock::Clock) implementation
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("no tokio runtime available to drive timers")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    #[error("clock refused subscription: {reason}")]
    Refused { reason: String },
}

/// Errors during timer, debouncer or throttler operations
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("clock is unavailable")]
    ClockUnavailable(#[source] ClockError),

    #[error("failed to schedule timer subscription")]
    Schedule(#[source] ClockError),

    #[error("finite timers need at least one iteration")]
    ZeroIterations,
}
