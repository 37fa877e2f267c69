//! Throttling
//!
//! A [`Throttler`] turns a stream of calls into at most one callback run per
//! interval. Each call computes a deadline for the single pending job:
//!
//! - **Fixed**: keep a steady cadence. An idle throttler runs one interval
//!   out (or right away with `immediate_fire`); calls arriving while a job is
//!   pending coalesce onto it.
//! - **Deferred**: wait a full interval from the latest call, unless the
//!   throttler is idle and `immediate_fire` is set.
//!
//! Both modes first hold any call closer than one interval to the last run.

mod dispatch;
mod throttler;


pub use throttler::{ThrottleOptions, Throttler};
