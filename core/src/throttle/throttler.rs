use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use repeat_types::{Interval, ThrottleMode};
use tokio::time::Instant;

use super::dispatch::ThrottleSchedule;
use crate::clock::{Clock, FireHandler, ScheduleRequest, Subscription, default_clock};
use crate::debounce::Callback;
use crate::error::TimerError;

/// Construction options for [`Throttler`]
#[derive(Debug, Clone, Default)]
pub struct ThrottleOptions {
    pub mode: ThrottleMode,
    /// Run the first call of an idle throttler right away
    pub immediate_fire: bool,
    /// Clock and execution context; the current tokio runtime when `None`
    pub clock: Option<Arc<dyn Clock>>,
}

impl ThrottleOptions {
    pub fn with_mode(mut self, mode: ThrottleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_immediate_fire(mut self, immediate_fire: bool) -> Self {
        self.immediate_fire = immediate_fire;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Runs a callback at most once per interval, however often it is called.
pub struct Throttler {
    interval: Interval,
    mode: ThrottleMode,
    immediate_fire: bool,
    clock: Arc<dyn Clock>,
    callback: Callback,
    shared: Arc<Mutex<ThrottleState>>,
}

#[derive(Default)]
struct ThrottleState {
    schedule: ThrottleSchedule,
    /// Bumped on every call; a job only runs if it is still the latest
    generation: u64,
    pending: Option<Box<dyn Subscription>>,
}

impl Throttler {
    pub fn new<F>(interval: Interval, options: ThrottleOptions, callback: F) -> Result<Self, TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let clock = match options.clock {
            Some(clock) => clock,
            None => default_clock().map_err(TimerError::ClockUnavailable)?,
        };

        Ok(Self {
            interval,
            mode: options.mode,
            immediate_fire: options.immediate_fire,
            clock,
            callback: Arc::new(callback),
            shared: Arc::new(Mutex::new(ThrottleState::default())),
        })
    }

    /// Request a run of the callback.
    ///
    /// Supersedes the pending job, if any, with one at a freshly computed
    /// deadline. A job that already started running is not affected.
    pub fn call(&self) -> Result<(), TimerError> {
        let mut state = lock_state(&self.shared);
        state.generation = state.generation.wrapping_add(1);
        if let Some(pending) = state.pending.take() {
            pending.teardown();
        }

        let now = self.clock.now();
        let deadline = state.schedule.dispatch_time(
            self.mode,
            self.interval.as_duration(),
            self.immediate_fire,
            now,
        );

        let request = ScheduleRequest {
            deadline,
            repeat: None,
            leeway: Duration::ZERO,
        };
        let mut job = match self.clock.schedule(request, self.job(state.generation)) {
            Ok(job) => job,
            Err(err) => {
                state.schedule.waiting_for_perform = false;
                return Err(TimerError::Schedule(err));
            }
        };
        job.resume();

        state.schedule.previous_scheduled = Some(deadline);
        state.schedule.waiting_for_perform = true;
        state.pending = Some(job);

        tracing::trace!(
            mode = %self.mode,
            delay = ?deadline.saturating_duration_since(now),
            "Throttled call scheduled"
        );
        Ok(())
    }

    fn job(&self, generation: u64) -> FireHandler {
        let shared = Arc::downgrade(&self.shared);
        let clock = Arc::clone(&self.clock);
        let callback = Arc::clone(&self.callback);

        Arc::new(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            {
                let mut state = lock_state(&shared);
                if state.generation != generation {
                    return;
                }
                state.schedule.last_execution = Some(clock.now());
                state.schedule.waiting_for_perform = false;
            }
            callback();
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn immediate_fire(&self) -> bool {
        self.immediate_fire
    }

    /// True while a call is scheduled and has not run yet
    pub fn is_waiting(&self) -> bool {
        lock_state(&self.shared).schedule.waiting_for_perform
    }

    pub fn last_execution(&self) -> Option<Instant> {
        lock_state(&self.shared).schedule.last_execution
    }
}

impl fmt::Debug for Throttler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttler")
            .field("interval", &self.interval)
            .field("mode", &self.mode)
            .field("immediate_fire", &self.immediate_fire)
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

impl Drop for Throttler {
    fn drop(&mut self) {
        let pending = lock_state(&self.shared).pending.take();
        if let Some(pending) = pending {
            pending.teardown();
        }
    }
}

fn lock_state(shared: &Mutex<ThrottleState>) -> MutexGuard<'_, ThrottleState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
