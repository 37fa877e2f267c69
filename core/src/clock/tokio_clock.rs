//! Clock implementation on the tokio timer wheel
//!
//! Each subscription is a task spawned on the runtime the clock was built
//! with. The task waits while suspended, sleeps until the deadline and calls
//! the handler inline, so fires of one subscription never overlap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::{Clock, FireHandler, ScheduleRequest, Subscription, deadline_after};
use crate::error::ClockError;

/// Clock backed by a tokio runtime handle (the execution context)
#[derive(Debug, Clone)]
pub struct TokioClock {
    handle: Handle,
}

impl TokioClock {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Clock on the runtime of the calling context
    pub fn current() -> Result<Self, ClockError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(ClockError::NoRuntime)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(
        &self,
        request: ScheduleRequest,
        on_fire: FireHandler,
    ) -> Result<Box<dyn Subscription>, ClockError> {
        if request.repeat.is_some_and(|period| period.is_zero()) {
            return Err(ClockError::Refused {
                reason: "repeat period must be non-zero".to_string(),
            });
        }

        // tokio has no leeway knob; its wheel already coalesces at 1ms
        tracing::trace!(
            repeat = ?request.repeat,
            leeway = ?request.leeway,
            "Scheduling tokio subscription"
        );

        let (active_tx, active_rx) = watch::channel(false);
        let armed = Arc::new(AtomicBool::new(true));
        let task = self
            .handle
            .spawn(drive(request, on_fire, active_rx, Arc::clone(&armed)));

        Ok(Box::new(TokioSubscription {
            active: active_tx,
            armed,
            task,
        }))
    }
}

/// Subscription handle returned by [`TokioClock`]
#[derive(Debug)]
pub struct TokioSubscription {
    active: watch::Sender<bool>,
    armed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription for TokioSubscription {
    fn resume(&mut self) {
        self.active.send_replace(true);
    }

    fn suspend(&mut self) {
        self.active.send_replace(false);
    }

    fn is_suspended(&self) -> bool {
        !*self.active.borrow()
    }

    fn disarm(&mut self) {
        self.armed.store(false, Ordering::Release);
    }

    fn cancel(self: Box<Self>) {
        if self.is_suspended() {
            tracing::warn!("Cancelling a suspended subscription without teardown");
        }
        // Drop aborts the task
    }
}

impl Drop for TokioSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    request: ScheduleRequest,
    on_fire: FireHandler,
    mut active: watch::Receiver<bool>,
    armed: Arc<AtomicBool>,
) {
    let mut deadline = request.deadline;

    loop {
        if active.wait_for(|running| *running).await.is_err() {
            return;
        }

        tokio::select! {
            _ = time::sleep_until(deadline) => {}
            changed = active.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
        }

        // Suspended right at the deadline: deliver on resume
        if !*active.borrow() {
            continue;
        }
        if !armed.load(Ordering::Acquire) {
            return;
        }

        on_fire();

        match request.repeat {
            Some(period) => deadline = next_deadline(deadline, period, Instant::now()),
            None => return,
        }
    }
}

/// Next tick after `previous`, skipping ticks already missed at `now`
fn next_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline_after(previous, period);
    if next > now {
        return next;
    }

    let period_nanos = period.as_nanos().max(1);
    let missed = now.duration_since(next).as_nanos() / period_nanos + 1;
    let skip = u64::try_from(missed * period_nanos).unwrap_or(u64::MAX);
    deadline_after(next, Duration::from_nanos(skip))
}
