//! Debouncer
//!
//! Delays a callback until calls stop arriving for one full delay. Every
//! call pushes the pending fire back, so only the last call of a burst runs.
//! Built on a single `Once` [`Timer`] that is created on the first call and
//! reset (never recreated) afterwards.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use repeat_types::Interval;

use crate::clock::Clock;
use crate::error::TimerError;
use crate::timers::{Timer, TimerOptions};

/// Callback run by a debouncer or throttler
pub type Callback = Arc<dyn Fn() + Send + Sync>;

pub struct Debouncer {
    delay: Interval,
    callback: Arc<Mutex<Option<Callback>>>,
    clock: Option<Arc<dyn Clock>>,
    timer: Option<Timer>,
}

impl Debouncer {
    /// Debouncer without a callback; set one with [`Debouncer::set_callback`]
    pub fn new(delay: Interval) -> Self {
        Self {
            delay,
            callback: Arc::new(Mutex::new(None)),
            clock: None,
            timer: None,
        }
    }

    pub fn with_callback<F>(delay: Interval, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let debouncer = Self::new(delay);
        debouncer.set_callback(callback);
        debouncer
    }

    /// Use a specific clock instead of the current tokio runtime
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Schedule the callback one delay from now, dropping any pending fire.
    ///
    /// `new_delay` replaces the stored delay for this and later calls.
    /// If the clock refuses the new subscription, the pending fire is already
    /// gone and nothing is scheduled until a later call succeeds.
    pub fn call(&mut self, new_delay: Option<Interval>) -> Result<(), TimerError> {
        if let Some(delay) = new_delay {
            self.delay = delay;
        }

        if let Some(timer) = &self.timer {
            return timer
                .try_reset(Some(self.delay), true)
                .map_err(TimerError::Schedule);
        }

        let mut options = TimerOptions::default();
        if let Some(clock) = &self.clock {
            options = options.with_clock(Arc::clone(clock));
        }

        let slot = Arc::clone(&self.callback);
        let timer = Timer::once(self.delay, options, move |_| {
            let callback = lock_slot(&slot).clone();
            match callback {
                Some(callback) => callback(),
                None => tracing::debug!("Debouncer fired but callback not set"),
            }
        })?;
        self.timer = Some(timer);
        Ok(())
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        *lock_slot(&self.callback) = Some(callback);
    }

    pub fn clear_callback(&self) {
        *lock_slot(&self.callback) = None;
    }

    pub fn delay(&self) -> Interval {
        self.delay
    }

    /// True while a fire is scheduled
    pub fn is_pending(&self) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| timer.state().is_running())
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("timer", &self.timer)
            .finish()
    }
}

fn lock_slot(slot: &Mutex<Option<Callback>>) -> MutexGuard<'_, Option<Callback>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
