//! Repeating / one-shot timer state machine

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use repeat_types::{Interval, Mode, State};

use super::observers::{Observer, ObserverTable, ObserverToken};
use crate::clock::{Clock, FireHandler, ScheduleRequest, Subscription, default_clock};
use crate::error::{ClockError, TimerError};

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a timer, for logs and lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    fn next() -> Self {
        Self(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Hook called after every state change
pub type StateHook = Arc<dyn Fn(&Timer, State) + Send + Sync>;

/// Construction options for [`Timer`]
#[derive(Debug, Clone, Default)]
pub struct TimerOptions {
    pub mode: Mode,
    /// Leeway handed to the clock; never affects iteration counting
    pub tolerance: Duration,
    /// Clock and execution context; the current tokio runtime when `None`
    pub clock: Option<Arc<dyn Clock>>,
}

impl TimerOptions {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// A cancellable timer firing its observers once, `n` times, or forever.
///
/// The timer starts `Paused`. Observers receive the timer itself and may call
/// back into it (`pause`, `reset`, `remove_observer`, ...) while it fires:
/// no internal lock is held while observers or the state hook run.
///
/// If an observer changes the state during a fire, the automatic post-fire
/// transition is skipped and the observer's change stands.
///
/// Equality is identity: two timers are equal only if they are the same timer.
pub struct Timer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    id: TimerId,
    clock: Arc<dyn Clock>,
    core: Mutex<TimerCore>,
    on_state_changed: Mutex<Option<StateHook>>,
}

struct TimerCore {
    interval: Interval,
    mode: Mode,
    tolerance: Duration,
    /// `Some` only for `Mode::Finite`
    remaining: Option<u64>,
    state: State,
    /// Last iteration of the current arm has fired; only a reset re-arms
    spent: bool,
    observers: ObserverTable,
    subscription: Option<Box<dyn Subscription>>,
}

impl TimerCore {
    /// Returns the new state if it differs from the current one
    fn set_state(&mut self, state: State) -> Option<State> {
        if self.state == state {
            return None;
        }
        self.state = state;
        Some(state)
    }

    fn suspend_subscription(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.suspend();
        }
    }
}

impl Timer {
    /// Create a paused timer with one observer.
    ///
    /// The clock subscription is configured (first deadline one interval from
    /// now) but not started; call [`Timer::start`].
    pub fn new<F>(interval: Interval, options: TimerOptions, observer: F) -> Result<Self, TimerError>
    where
        F: Fn(&Timer) + Send + Sync + 'static,
    {
        let clock = match options.clock {
            Some(clock) => clock,
            None => default_clock().map_err(TimerError::ClockUnavailable)?,
        };

        let mut observers = ObserverTable::default();
        observers.insert(Arc::new(observer));

        let timer = Timer {
            inner: Arc::new(TimerInner {
                id: TimerId::next(),
                clock,
                core: Mutex::new(TimerCore {
                    interval,
                    mode: options.mode,
                    tolerance: options.tolerance,
                    remaining: options.mode.iterations(),
                    state: State::Paused,
                    spent: false,
                    observers,
                    subscription: None,
                }),
                on_state_changed: Mutex::new(None),
            }),
        };

        {
            let mut core = timer.core();
            let subscription = timer.configure(&core).map_err(TimerError::Schedule)?;
            core.subscription = Some(subscription);
        }

        tracing::debug!(
            timer = %timer.id(),
            mode = ?options.mode,
            interval = ?interval.as_duration(),
            "Timer created"
        );
        Ok(timer)
    }

    /// Create and start a timer that fires once, `after` from now
    pub fn once<F>(after: Interval, options: TimerOptions, observer: F) -> Result<Self, TimerError>
    where
        F: Fn(&Timer) + Send + Sync + 'static,
    {
        let timer = Self::new(after, options.with_mode(Mode::Once), observer)?;
        timer.start();
        Ok(timer)
    }

    /// Create and start a timer firing every `interval`, `count` times or forever
    pub fn every<F>(
        interval: Interval,
        count: Option<u64>,
        options: TimerOptions,
        observer: F,
    ) -> Result<Self, TimerError>
    where
        F: Fn(&Timer) + Send + Sync + 'static,
    {
        let mode = match count {
            Some(count) => Mode::finite(count).ok_or(TimerError::ZeroIterations)?,
            None => Mode::Infinite,
        };
        let timer = Self::new(interval, options.with_mode(mode), observer)?;
        timer.start();
        Ok(timer)
    }

    // ─── Observers ──────────────────────────────────────────────────────────

    /// Register an observer; it runs after all observers registered before it
    pub fn observe<F>(&self, observer: F) -> ObserverToken
    where
        F: Fn(&Timer) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        self.core().observers.insert(observer)
    }

    /// Remove an observer. Safe to call from inside a fire: a removed observer
    /// that has not run yet in the current fire will not run.
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        self.core().observers.remove(token)
    }

    pub fn remove_all_observers(&self, also_pause: bool) {
        self.core().observers.clear();
        if also_pause {
            self.pause();
        }
    }

    pub fn observer_count(&self) -> usize {
        self.core().observers.len()
    }

    pub fn set_on_state_changed<F>(&self, hook: F)
    where
        F: Fn(&Timer, State) + Send + Sync + 'static,
    {
        let hook: StateHook = Arc::new(hook);
        *self.hook_slot() = Some(hook);
    }

    pub fn clear_on_state_changed(&self) {
        *self.hook_slot() = None;
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Start or resume the timer. Returns false if it is already running.
    ///
    /// A finished timer is fully reset (iterations re-armed) and restarted.
    pub fn start(&self) -> bool {
        let transition = {
            let mut core = self.core();
            if core.state.is_running() {
                return false;
            }
            if core.state.is_finished() || core.spent || core.subscription.is_none() {
                drop(core);
                return self.reset(None, true);
            }
            if let Some(subscription) = core.subscription.as_mut() {
                subscription.resume();
            }
            core.set_state(State::Running)
        };

        tracing::debug!(timer = %self.id(), "Timer started");
        self.notify(transition);
        true
    }

    /// Pause the timer. Returns false if it is already paused or finished.
    pub fn pause(&self) -> bool {
        let transition = {
            let mut core = self.core();
            if matches!(core.state, State::Paused | State::Finished) {
                return false;
            }
            core.suspend_subscription();
            core.set_state(State::Paused)
        };

        tracing::debug!(timer = %self.id(), "Timer paused");
        self.notify(transition);
        true
    }

    /// Fire now, out of schedule. Counts as a real iteration.
    pub fn fire(&self, and_pause: bool) {
        self.dispatch();
        if and_pause {
            self.pause();
        }
    }

    /// Re-arm the timer: restore the iteration count, optionally change the
    /// interval, and replace the clock subscription with a fresh one.
    ///
    /// Leaves the timer `Paused`, or `Running` when `restart` is set. Returns
    /// false if the clock refused the new subscription.
    pub fn reset(&self, interval: Option<Interval>, restart: bool) -> bool {
        match self.try_reset(interval, restart) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(timer = %self.id(), error = %err, "Failed to reschedule timer");
                false
            }
        }
    }

    /// [`Timer::reset`], keeping the clock error
    pub(crate) fn try_reset(&self, interval: Option<Interval>, restart: bool) -> Result<(), ClockError> {
        let mut transitions = Vec::with_capacity(2);

        let rearmed = {
            let mut core = self.core();
            if core.state.is_running() {
                core.suspend_subscription();
            }
            if let Some(count) = core.mode.iterations() {
                core.remaining = Some(count);
            }
            if let Some(interval) = interval {
                core.interval = interval;
            }
            if let Some(previous) = core.subscription.take() {
                previous.teardown();
            }
            core.spent = false;
            transitions.extend(core.set_state(State::Paused));

            let configured = self.configure(&core);
            let mut subscription = match configured {
                Ok(subscription) => subscription,
                Err(err) => {
                    drop(core);
                    return self.settle(transitions, Err(err));
                }
            };
            if restart {
                subscription.resume();
                transitions.extend(core.set_state(State::Running));
            }
            core.subscription = Some(subscription);
            Ok(())
        };

        tracing::debug!(timer = %self.id(), restart, "Timer reset");
        self.settle(transitions, rearmed)
    }

    /// Report queued transitions once no lock is held
    fn settle<T>(&self, transitions: Vec<State>, result: T) -> T {
        for state in transitions {
            self.notify(Some(state));
        }
        result
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn id(&self) -> TimerId {
        self.inner.id
    }

    pub fn state(&self) -> State {
        self.core().state
    }

    pub fn mode(&self) -> Mode {
        self.core().mode
    }

    pub fn interval(&self) -> Interval {
        self.core().interval
    }

    pub fn tolerance(&self) -> Duration {
        self.core().tolerance
    }

    /// Iterations left before finishing (only for finite timers)
    pub fn remaining_iterations(&self) -> Option<u64> {
        self.core().remaining
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn core(&self) -> MutexGuard<'_, TimerCore> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn hook_slot(&self) -> MutexGuard<'_, Option<StateHook>> {
        self.inner
            .on_state_changed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a suspended subscription for the current interval and mode.
    /// The handler only holds a weak reference back to the timer.
    fn configure(&self, core: &TimerCore) -> Result<Box<dyn Subscription>, ClockError> {
        let weak = Arc::downgrade(&self.inner);
        let handler: FireHandler = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Timer { inner }.dispatch();
            }
        });

        let now = self.inner.clock.now();
        let period = core.interval.as_duration();
        let request = if core.mode.is_repeating() {
            ScheduleRequest::repeating(now, period, core.tolerance)
        } else {
            ScheduleRequest::once(now, period, core.tolerance)
        };
        self.inner.clock.schedule(request, handler)
    }

    /// One iteration: count it, run observers, then settle the state
    fn dispatch(&self) {
        let (prior, observers) = {
            let mut core = self.core();
            if let Some(remaining) = core.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            core.spent = match core.mode {
                Mode::Once => true,
                Mode::Finite(_) => core.remaining == Some(0),
                Mode::Infinite => false,
            };
            let prior = core.state;
            core.state = State::Executing;
            (prior, core.observers.snapshot())
        };

        tracing::trace!(timer = %self.id(), observers = observers.len(), "Timer fired");
        if prior != State::Executing {
            self.notify(Some(State::Executing));
        }

        for (token, observer) in observers {
            let registered = self.core().observers.contains(token);
            if registered {
                observer(self);
            }
        }

        let transition = {
            let mut core = self.core();
            match core.state {
                State::Executing if core.spent => {
                    core.suspend_subscription();
                    core.set_state(State::Finished)
                }
                State::Executing if prior.is_running() => core.set_state(State::Running),
                State::Executing => core.set_state(prior),
                // Paused by an observer on the last iteration: still finished
                State::Paused if core.spent => core.set_state(State::Finished),
                _ => return,
            }
        };

        self.notify(transition);
    }

    fn notify(&self, transition: Option<State>) {
        let Some(state) = transition else {
            return;
        };

        tracing::trace!(timer = %self.id(), %state, "Timer state changed");
        let hook = self.hook_slot().clone();
        if let Some(hook) = hook {
            hook(self, state);
        }
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Timer {}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core();
        f.debug_struct("Timer")
            .field("id", &self.inner.id)
            .field("state", &core.state)
            .field("mode", &core.mode)
            .field("interval", &core.interval)
            .field("remaining", &core.remaining)
            .finish()
    }
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.observers.clear();
        if let Some(subscription) = core.subscription.take() {
            subscription.teardown();
        }
        tracing::trace!(timer = %self.id, "Timer released");
    }
}
