//! Cancellable recurring timers, debouncing and throttling on tokio.
//!
//! - [`Timer`]: fires observers once, `n` times, or forever
//! - [`Debouncer`]: runs a callback once calls stop for a full delay
//! - [`Throttler`]: runs a callback at most once per interval
//!
//! All scheduling goes through the [`Clock`] capability; [`TokioClock`] is
//! the default, bound to the runtime the timer is created on.

pub mod clock;
pub mod debounce;
pub mod error;
pub mod throttle;
pub mod timers;

// Re-exports for convenience
pub use clock::{Clock, ScheduleRequest, Subscription, TokioClock};
pub use debounce::{Callback, Debouncer};
pub use error::{ClockError, TimerError};
pub use repeat_types::{Interval, Mode, State, ThrottleMode};
pub use throttle::{ThrottleOptions, Throttler};
pub use timers::{ObserverToken, Timer, TimerId, TimerOptions};
