//! Tests for the Timer state machine
//!
//! Verifies that:
//! - Once / Finite / Infinite timers fire the right number of times
//! - start / pause / fire / reset follow the lifecycle rules
//! - Observers can call back into the timer while it fires
//!
//! Timing tests run on tokio's paused clock, so sleeps advance virtual time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use repeat_types::{Interval, Mode, State};
use tokio::time;

use super::{ObserverToken, Timer, TimerOptions};
use crate::error::TimerError;

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn ms(value: u64) -> Interval {
    Interval::Milliseconds(value)
}

async fn advance(millis: u64) {
    time::sleep(Duration::from_millis(millis)).await;
}

/// Observer that counts its invocations
fn counting() -> (Arc<AtomicUsize>, impl Fn(&Timer) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move |_: &Timer| {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

fn fired(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}

/// Record every state the timer reports through its hook
fn record_states(timer: &Timer) -> Arc<Mutex<Vec<State>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    timer.set_on_state_changed(move |_, state| sink.lock().unwrap().push(state));
    states
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_new_timer_is_paused_until_started() {
    let (count, observer) = counting();
    let timer = Timer::new(ms(100), TimerOptions::default(), observer).unwrap();

    assert_eq!(timer.state(), State::Paused);
    assert_eq!(timer.mode(), Mode::Infinite);
    assert_eq!(timer.remaining_iterations(), None);
    assert_eq!(timer.observer_count(), 1);

    advance(500).await;
    assert_eq!(fired(&count), 0);

    assert!(timer.start());
    assert!(timer.state().is_running());
}

#[test]
fn test_new_without_runtime_reports_clock_unavailable() {
    let result = Timer::new(ms(100), TimerOptions::default(), |_| {});
    assert!(matches!(result, Err(TimerError::ClockUnavailable(_))));
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_repeating_timer_is_refused() {
    let result = Timer::new(ms(0), TimerOptions::default(), |_| {});
    assert!(matches!(result, Err(TimerError::Schedule(_))));
}

#[tokio::test(start_paused = true)]
async fn test_every_rejects_zero_count() {
    let result = Timer::every(ms(100), Some(0), TimerOptions::default(), |_| {});
    assert!(matches!(result, Err(TimerError::ZeroIterations)));
}

#[tokio::test(start_paused = true)]
async fn test_timers_compare_by_identity() {
    let a = Timer::new(ms(100), TimerOptions::default(), |_| {}).unwrap();
    let b = Timer::new(ms(100), TimerOptions::default(), |_| {}).unwrap();

    assert_eq!(a, a);
    assert_ne!(a, b);
    assert_ne!(a.id(), b.id());
}

// ═══════════════════════════════════════════════════════════════════════════
// Modes
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_finite_timer_fires_exactly_n_times() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let timer = Timer::every(ms(100), Some(3), TimerOptions::default(), move |t| {
        sink.lock().unwrap().push(t.remaining_iterations());
    })
    .unwrap();

    advance(1_000).await;

    // Observers see the post-decrement count
    assert_eq!(*seen.lock().unwrap(), vec![Some(2), Some(1), Some(0)]);
    assert_eq!(timer.state(), State::Finished);
    assert_eq!(timer.remaining_iterations(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_once_timer_fires_once_and_restarts() {
    let (count, observer) = counting();
    let timer = Timer::once(ms(100), TimerOptions::default(), observer).unwrap();
    let states = record_states(&timer);

    advance(150).await;
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Finished);

    advance(500).await;
    assert_eq!(fired(&count), 1);

    assert!(timer.start());
    advance(150).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            State::Executing,
            State::Finished,
            State::Paused,
            State::Running,
            State::Executing,
            State::Finished,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_infinite_timer_keeps_firing() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    advance(1_050).await;
    assert_eq!(fired(&count), 10);
    assert_eq!(timer.state(), State::Running);
}

// ═══════════════════════════════════════════════════════════════════════════
// start / pause / fire / reset
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_start_and_pause_report_noops() {
    let timer = Timer::new(ms(100), TimerOptions::default(), |_| {}).unwrap();

    assert!(!timer.pause());
    assert!(timer.start());
    assert!(!timer.start());
    assert!(timer.pause());
    assert!(!timer.pause());

    let once = Timer::once(ms(10), TimerOptions::default(), |_| {}).unwrap();
    advance(50).await;
    assert_eq!(once.state(), State::Finished);
    assert!(!once.pause());
}

#[tokio::test(start_paused = true)]
async fn test_pause_then_start_keeps_schedule() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    advance(150).await;
    assert!(timer.pause());
    assert!(timer.start());

    advance(300).await;
    // Same fires as an uninterrupted run: 100, 200, 300, 400
    assert_eq!(fired(&count), 4);
}

#[tokio::test(start_paused = true)]
async fn test_paused_timer_does_not_fire() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    advance(150).await;
    timer.pause();
    advance(1_000).await;
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_manual_fire_counts_as_iteration() {
    let (count, observer) = counting();
    let options = TimerOptions::default().with_mode(Mode::finite(2).unwrap());
    let timer = Timer::new(ms(100), options, observer).unwrap();

    timer.fire(false);
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.remaining_iterations(), Some(1));
    // Firing a paused timer does not start it
    assert_eq!(timer.state(), State::Paused);

    timer.fire(false);
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_fire_and_pause() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    timer.fire(true);
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Paused);

    advance(500).await;
    assert_eq!(fired(&count), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_restores_finite_count() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), Some(5), TimerOptions::default(), observer).unwrap();

    advance(250).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.remaining_iterations(), Some(3));

    assert!(timer.reset(Some(ms(50)), true));
    assert_eq!(timer.remaining_iterations(), Some(5));
    assert_eq!(timer.interval(), ms(50));
    assert_eq!(timer.state(), State::Running);

    advance(1_000).await;
    assert_eq!(fired(&count), 7);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_reset_without_restart_stays_paused() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    assert!(timer.reset(None, false));
    assert_eq!(timer.state(), State::Paused);

    advance(500).await;
    assert_eq!(fired(&count), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_timer_never_fires() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();

    advance(150).await;
    drop(timer);
    advance(1_000).await;
    assert_eq!(fired(&count), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Observers and re-entrancy
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_observers_run_in_insertion_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let timer = Timer::new(ms(100), TimerOptions::default(), move |_| {
        first.lock().unwrap().push(1);
    })
    .unwrap();
    let second = Arc::clone(&order);
    timer.observe(move |_| second.lock().unwrap().push(2));
    let third = Arc::clone(&order);
    timer.observe(move |_| third.lock().unwrap().push(3));

    timer.fire(false);
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_observer_removed_mid_fire_is_skipped() {
    let victim: Arc<OnceLock<ObserverToken>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&victim);
    let timer = Timer::every(ms(100), Some(3), TimerOptions::default(), move |t| {
        if let Some(token) = slot.get() {
            t.remove_observer(*token);
        }
    })
    .unwrap();

    let (count, observer) = counting();
    victim.set(timer.observe(observer)).unwrap();
    assert_eq!(timer.observer_count(), 2);

    advance(1_000).await;
    assert_eq!(fired(&count), 0);
    assert_eq!(timer.observer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_all_observers_and_pause() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), None, TimerOptions::default(), observer).unwrap();
    timer.observe(|_| {});

    timer.remove_all_observers(true);
    assert_eq!(timer.observer_count(), 0);
    assert_eq!(timer.state(), State::Paused);

    advance(500).await;
    assert_eq!(fired(&count), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_inside_observer_wins_over_auto_transition() {
    let (count, _) = counting();
    let inner = Arc::clone(&count);
    let timer = Timer::every(ms(100), Some(5), TimerOptions::default(), move |t| {
        if inner.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            t.pause();
        }
    })
    .unwrap();

    advance(1_000).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Paused);
    assert_eq!(timer.remaining_iterations(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_pause_on_last_iteration_still_finishes() {
    let (count, _) = counting();
    let inner = Arc::clone(&count);
    let timer = Timer::every(ms(100), Some(2), TimerOptions::default(), move |t| {
        if inner.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            t.pause();
        }
    })
    .unwrap();
    let states = record_states(&timer);

    advance(1_000).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);
    assert_eq!(timer.remaining_iterations(), Some(0));
    assert_eq!(
        *states.lock().unwrap(),
        vec![
            State::Executing,
            State::Running,
            State::Executing,
            State::Paused,
            State::Finished,
        ]
    );

    // Start re-arms a full run instead of resuming the spent one
    assert!(timer.start());
    assert_eq!(timer.remaining_iterations(), Some(2));
    advance(1_000).await;
    assert_eq!(fired(&count), 4);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_pause_inside_once_observer_then_start_fires_again() {
    let (count, _) = counting();
    let inner = Arc::clone(&count);
    let timer = Timer::once(ms(100), TimerOptions::default(), move |t| {
        inner.fetch_add(1, Ordering::SeqCst);
        t.pause();
    })
    .unwrap();

    advance(150).await;
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Finished);

    assert!(timer.start());
    assert_eq!(timer.state(), State::Running);
    advance(150).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);

    advance(10_000).await;
    assert_eq!(fired(&count), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hook_restart_after_pause_on_last_iteration() {
    let (count, _) = counting();
    let inner = Arc::clone(&count);
    let timer = Timer::once(ms(100), TimerOptions::default(), move |t| {
        if inner.fetch_add(1, Ordering::SeqCst) == 0 {
            t.pause();
        }
    })
    .unwrap();
    // Restarting from the Paused notification re-arms the spent timer
    timer.set_on_state_changed(|t, state| {
        if state == State::Paused {
            assert!(t.start());
        }
    });

    advance(150).await;
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Running);

    advance(100).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_reset_inside_once_observer_rearms() {
    let (count, _) = counting();
    let inner = Arc::clone(&count);
    let timer = Timer::once(ms(100), TimerOptions::default(), move |t| {
        if inner.fetch_add(1, Ordering::SeqCst) == 0 {
            assert!(t.reset(None, true));
        }
    })
    .unwrap();

    advance(150).await;
    assert_eq!(fired(&count), 1);
    assert_eq!(timer.state(), State::Running);

    advance(100).await;
    assert_eq!(fired(&count), 2);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_start_inside_observer_is_noop() {
    let result = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&result);
    let timer = Timer::once(ms(100), TimerOptions::default(), move |t| {
        *sink.lock().unwrap() = Some(t.start());
    })
    .unwrap();

    advance(150).await;
    assert_eq!(*result.lock().unwrap(), Some(false));
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_state_hook_can_restart_finished_timer() {
    let (count, observer) = counting();
    let timer = Timer::every(ms(100), Some(2), TimerOptions::default(), observer).unwrap();

    let restarted = Arc::new(AtomicUsize::new(0));
    let restarts = Arc::clone(&restarted);
    timer.set_on_state_changed(move |t, state| {
        if state.is_finished() && restarts.fetch_add(1, Ordering::SeqCst) == 0 {
            assert!(t.start());
        }
    });

    advance(1_000).await;
    assert_eq!(fired(&count), 4);
    assert_eq!(restarted.load(Ordering::SeqCst), 2);
    assert_eq!(timer.state(), State::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_tolerance_does_not_change_counting() {
    let (count, observer) = counting();
    let options = TimerOptions::default().with_tolerance(Duration::from_millis(20));
    let timer = Timer::every(ms(100), Some(3), options, observer).unwrap();

    assert_eq!(timer.tolerance(), Duration::from_millis(20));
    advance(1_000).await;
    assert_eq!(fired(&count), 3);
}
