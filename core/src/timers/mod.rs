//! Timer system
//!
//! This module provides:
//! - **Timer**: a cancellable timer that fires its observers once, a fixed
//!   number of times, or forever
//! - **Observers**: callbacks registered on a timer, removable by token
//!
//! # Lifecycle
//!
//! ```text
//!            start()                 fire
//!   Paused ──────────▶ Running ─────────────▶ Executing
//!     ▲                  ▲  │                    │
//!     │     pause()      │  │                    ├── Once / Finite(0 left) ──▶ Finished
//!     └──────────────────┼──┘                    │                              │
//!                        └───────────────────────┘ Infinite / Finite(n left)   │
//!                                                                              │
//!                  start() / reset(restart) re-arms ◀──────────────────────────┘
//! ```

mod observers;
mod timer;

#[cfg(test)]
mod timer_tests;

pub use observers::{Observer, ObserverToken};
pub use timer::{StateHook, Timer, TimerId, TimerOptions};
