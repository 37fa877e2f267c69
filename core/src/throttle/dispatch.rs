//! Dispatch-time computation for throttled calls

use std::time::Duration;

use repeat_types::ThrottleMode;
use tokio::time::Instant;

use crate::clock::deadline_after;

/// Scheduling history a throttler's next deadline depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ThrottleSchedule {
    /// Deadline given to the most recent job
    pub previous_scheduled: Option<Instant>,
    /// When the callback last actually ran
    pub last_execution: Option<Instant>,
    /// A job is scheduled and has not run yet
    pub waiting_for_perform: bool,
}

impl ThrottleSchedule {
    /// Deadline for a call arriving at `now`
    pub fn dispatch_time(
        &self,
        mode: ThrottleMode,
        interval: Duration,
        immediate_fire: bool,
        now: Instant,
    ) -> Instant {
        // Too soon since the last real execution: hold the rate
        if let Some(last) = self.last_execution {
            let earliest = deadline_after(last, interval);
            if earliest > now {
                return earliest;
            }
        }

        match mode {
            ThrottleMode::Fixed => {
                if !self.waiting_for_perform {
                    return if immediate_fire {
                        now
                    } else {
                        deadline_after(now, interval)
                    };
                }
                // Coalesce onto the fire that is already scheduled
                match self.previous_scheduled {
                    Some(previous) if previous > now => previous,
                    _ => now,
                }
            }
            ThrottleMode::Deferred => {
                if !self.waiting_for_perform && immediate_fire {
                    now
                } else {
                    deadline_after(now, interval)
                }
            }
        }
    }
}
