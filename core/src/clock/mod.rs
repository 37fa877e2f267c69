//! Host clock capability
//!
//! Timers and throttlers never sleep themselves. They ask a [`Clock`] to
//! invoke a handler at (or after) an absolute deadline, optionally repeating,
//! and keep the returned [`Subscription`] to suspend, resume or cancel it.
//!
//! # Subscription lifecycle
//!
//! ```text
//!   schedule() ──▶ suspended ──resume()──▶ active ──deadline──▶ handler()
//!                     ▲                      │
//!                     └──────suspend()───────┘
//!
//!   teardown(): disarm ─▶ resume if suspended ─▶ cancel
//! ```
//!
//! A deadline that passes while suspended is delivered once, on resume.

mod tokio_clock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ClockError;

pub use tokio_clock::{TokioClock, TokioSubscription};

/// Callback a clock invokes when a subscription fires
pub type FireHandler = Arc<dyn Fn() + Send + Sync>;

/// What to schedule: first deadline, optional repeat period and leeway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRequest {
    /// Absolute monotonic time of the first fire
    pub deadline: Instant,
    /// Period between fires, `None` for a single fire
    pub repeat: Option<Duration>,
    /// Slack the clock may add to a deadline to coalesce work
    pub leeway: Duration,
}

impl ScheduleRequest {
    /// A single fire `delay` after `now`
    pub fn once(now: Instant, delay: Duration, leeway: Duration) -> Self {
        Self {
            deadline: deadline_after(now, delay),
            repeat: None,
            leeway,
        }
    }

    /// A fire every `period`, the first one `period` after `now`
    pub fn repeating(now: Instant, period: Duration, leeway: Duration) -> Self {
        Self {
            deadline: deadline_after(now, period),
            repeat: Some(period),
            leeway,
        }
    }
}

/// Monotonic clock able to call back at absolute deadlines
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic time
    fn now(&self) -> Instant;

    /// Create a suspended subscription that calls `on_fire` per `request`
    fn schedule(
        &self,
        request: ScheduleRequest,
        on_fire: FireHandler,
    ) -> Result<Box<dyn Subscription>, ClockError>;
}

/// Handle to one scheduled (possibly repeating) fire
pub trait Subscription: Send + fmt::Debug {
    /// Start or continue delivering fires
    fn resume(&mut self);

    /// Stop delivering fires until resumed; the schedule is kept
    fn suspend(&mut self);

    fn is_suspended(&self) -> bool;

    /// Drop the handler reference: any fire not yet delivered becomes a no-op
    fn disarm(&mut self);

    /// Release the subscription. Must not be called while suspended;
    /// use [`Subscription::teardown`].
    fn cancel(self: Box<Self>);

    /// Release the subscription safely from any state
    fn teardown(mut self: Box<Self>) {
        self.disarm();
        if self.is_suspended() {
            self.resume();
        }
        self.cancel();
    }
}

/// Default clock: tokio on the current runtime
pub fn default_clock() -> Result<Arc<dyn Clock>, ClockError> {
    Ok(Arc::new(TokioClock::current()?))
}

// ~30 years, used when a deadline would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, clamped instead of overflowing
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .unwrap_or_else(|| now + FAR_FUTURE)
}
