//! Shared value types for repeat timers
//!
//! This crate contains the serializable value types shared between the
//! scheduling core (repeat-core) and anything that configures it (repeat-cli).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Interval
// ─────────────────────────────────────────────────────────────────────────────

/// A relative duration expressed in one of several units.
///
/// Every variant normalizes to a single [`Duration`] via [`Interval::as_duration`].
/// Integer units saturate at [`Duration::MAX`] instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Nanoseconds(u64),
    Microseconds(u64),
    Milliseconds(u64),
    /// Fractional seconds. Negative or NaN values normalize to zero.
    Seconds(f64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl Interval {
    /// Normalize to a canonical duration
    pub fn as_duration(&self) -> Duration {
        match *self {
            Interval::Nanoseconds(v) => Duration::from_nanos(v),
            Interval::Microseconds(v) => Duration::from_micros(v),
            Interval::Milliseconds(v) => Duration::from_millis(v),
            Interval::Seconds(v) => seconds_to_duration(v),
            Interval::Minutes(v) => secs_saturating(v, 60),
            Interval::Hours(v) => secs_saturating(v, 3_600),
            Interval::Days(v) => secs_saturating(v, 86_400),
        }
    }

    /// Whether the interval normalizes to zero
    pub fn is_zero(&self) -> bool {
        self.as_duration().is_zero()
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::Seconds(1.0)
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Interval::Nanoseconds(nanos)
    }
}

impl From<Interval> for Duration {
    fn from(interval: Interval) -> Self {
        interval.as_duration()
    }
}

fn secs_saturating(value: u64, multiplier: u64) -> Duration {
    match value.checked_mul(multiplier) {
        Some(secs) => Duration::from_secs(secs),
        None => Duration::MAX,
    }
}

fn seconds_to_duration(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Repetition policy of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Fire a single time, then finish
    Once,
    /// Fire the given number of times, then finish
    Finite(NonZeroU64),
    /// Fire until paused or dropped
    #[default]
    Infinite,
}

impl Mode {
    /// Finite mode with `count` iterations; `None` when `count` is zero
    pub fn finite(count: u64) -> Option<Self> {
        NonZeroU64::new(count).map(Mode::Finite)
    }

    /// Returns true unless the mode is `Once`
    pub fn is_repeating(&self) -> bool {
        !matches!(self, Mode::Once)
    }

    /// Starting iteration count (only for `Finite`)
    pub fn iterations(&self) -> Option<u64> {
        match self {
            Mode::Finite(count) => Some(count.get()),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Mode::Infinite)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Idle: never started, or paused
    #[default]
    Paused,
    /// Scheduled and waiting for the next fire
    Running,
    /// Observers are being invoked
    Executing,
    /// Lifetime is over; only `start` or `reset` re-arms it
    Finished,
}

impl State {
    /// True while running, including while observers execute
    pub fn is_running(&self) -> bool {
        matches!(self, State::Running | State::Executing)
    }

    pub fn is_executing(&self) -> bool {
        matches!(self, State::Executing)
    }

    /// Always false for infinite timers
    pub fn is_finished(&self) -> bool {
        matches!(self, State::Finished)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            State::Paused => "idle/paused",
            State::Running => "running",
            State::Executing => "executing",
            State::Finished => "finished",
        };
        f.write_str(label)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Throttle mode
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduling policy of a throttler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleMode {
    /// Keep a steady cadence: fire as close to one interval after the last
    /// execution as possible, coalescing calls onto an already scheduled fire
    #[default]
    Fixed,
    /// Always wait a full interval from the latest call
    Deferred,
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleMode::Fixed => f.write_str("fixed"),
            ThrottleMode::Deferred => f.write_str("deferred"),
        }
    }
}
