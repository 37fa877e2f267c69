use crate::CliContext;
use chrono::Local;
use repeat_core::{Debouncer, Interval, ThrottleOptions, Throttler, Timer, TimerOptions};
use std::io::Write;

fn timestamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Observer attached to every timer created from the prompt
fn print_fire(timer: &Timer) {
    match timer.remaining_iterations() {
        Some(left) => println!("[{}] {} fired ({} left)", timestamp(), timer.id(), left),
        None => println!("[{}] {} fired", timestamp(), timer.id()),
    }
}

async fn interval_or_default(ctx: &CliContext, ms: Option<u64>) -> Interval {
    match ms {
        Some(ms) => Interval::Milliseconds(ms),
        None => ctx.config.read().await.default_interval,
    }
}

async fn timer_options(ctx: &CliContext) -> TimerOptions {
    let config = ctx.config.read().await;
    TimerOptions::default().with_tolerance(config.tolerance())
}

async fn register(ctx: &CliContext, timer: Timer) {
    println!(
        "Created {} ({:?}, every {:?})",
        timer.id(),
        timer.mode(),
        timer.interval().as_duration()
    );
    ctx.timers.write().await.insert(timer.id().value(), timer);
}

/// Run `action` on the timer with the given id, if it exists
async fn with_timer(ctx: &CliContext, id: u64, action: impl FnOnce(&Timer)) {
    let timers = ctx.timers.read().await;
    match timers.get(&id) {
        Some(timer) => action(timer),
        None => println!("No timer with id {}", id),
    }
}

pub async fn create_once(ctx: &CliContext, ms: Option<u64>) {
    let interval = interval_or_default(ctx, ms).await;
    let options = timer_options(ctx).await;

    match Timer::once(interval, options, print_fire) {
        Ok(timer) => register(ctx, timer).await,
        Err(e) => println!("Failed to create timer: {}", e),
    }
}

pub async fn create_every(ctx: &CliContext, ms: Option<u64>, count: Option<u64>) {
    let interval = interval_or_default(ctx, ms).await;
    let options = timer_options(ctx).await;

    match Timer::every(interval, count, options, print_fire) {
        Ok(timer) => register(ctx, timer).await,
        Err(e) => println!("Failed to create timer: {}", e),
    }
}

pub async fn start(ctx: &CliContext, id: u64) {
    with_timer(ctx, id, |timer| {
        if timer.start() {
            println!("{} started", timer.id());
        } else {
            println!("{} is already running", timer.id());
        }
    })
    .await;
}

pub async fn pause(ctx: &CliContext, id: u64) {
    with_timer(ctx, id, |timer| {
        if timer.pause() {
            println!("{} paused", timer.id());
        } else {
            println!("{} is not running ({})", timer.id(), timer.state());
        }
    })
    .await;
}

pub async fn fire(ctx: &CliContext, id: u64, and_pause: bool) {
    with_timer(ctx, id, |timer| timer.fire(and_pause)).await;
}

pub async fn reset(ctx: &CliContext, id: u64, ms: Option<u64>, restart: bool) {
    with_timer(ctx, id, |timer| {
        if timer.reset(ms.map(Interval::Milliseconds), restart) {
            println!("{} reset ({})", timer.id(), timer.state());
        } else {
            println!("{} could not be rescheduled", timer.id());
        }
    })
    .await;
}

pub async fn remove(ctx: &CliContext, id: u64) {
    match ctx.timers.write().await.remove(&id) {
        Some(timer) => println!("Removed {}", timer.id()),
        None => println!("No timer with id {}", id),
    }
}

pub async fn list_timers(ctx: &CliContext) {
    let timers = ctx.timers.read().await;
    if timers.is_empty() {
        println!("No timers");
        return;
    }

    println!(
        "{:<6} {:<14} {:<12} {:<14} {:<10} Observers",
        "Id", "Mode", "State", "Interval", "Left"
    );
    println!("{}", "-".repeat(70));

    for (id, timer) in timers.iter() {
        let left = timer
            .remaining_iterations()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<14} {:<12} {:<14} {:<10} {}",
            id,
            format!("{:?}", timer.mode()),
            timer.state().to_string(),
            format!("{:?}", timer.interval().as_duration()),
            left,
            timer.observer_count()
        );
    }

    println!("\nTotal: {} timers", timers.len());
}

pub async fn debounce(ctx: &CliContext, ms: Option<u64>) {
    let delay = ctx.config.read().await.debounce_delay;
    let mut slot = ctx.debouncer.lock().await;
    let debouncer = slot.get_or_insert_with(|| {
        Debouncer::with_callback(delay, || {
            println!("[{}] debounced action ran", timestamp());
        })
    });

    match debouncer.call(ms.map(Interval::Milliseconds)) {
        Ok(()) => println!(
            "Debounced; runs {:?} after the last call",
            debouncer.delay().as_duration()
        ),
        Err(e) => println!("Failed to debounce: {}", e),
    }
}

pub async fn throttle(ctx: &CliContext) {
    let mut slot = ctx.throttler.lock().await;

    if slot.is_none() {
        let config = ctx.config.read().await;
        let options = ThrottleOptions::default()
            .with_mode(config.throttle_mode)
            .with_immediate_fire(config.immediate_fire);
        let callback = || println!("[{}] throttled action ran", timestamp());

        match Throttler::new(config.throttle_interval, options, callback) {
            Ok(throttler) => *slot = Some(throttler),
            Err(e) => {
                println!("Failed to create throttler: {}", e);
                return;
            }
        }
    }

    if let Some(throttler) = slot.as_ref() {
        match throttler.call() {
            Ok(()) => println!("Throttled call queued ({} mode)", throttler.mode()),
            Err(e) => println!("Failed to throttle: {}", e),
        }
    }
}

pub async fn show_config(ctx: &CliContext) {
    let config = ctx.config.read().await;
    println!("{:#?}", *config);
}

pub async fn save_config(ctx: &CliContext) {
    let config = ctx.config.read().await;
    match config.save() {
        Ok(()) => println!("Configuration saved"),
        Err(e) => println!("{}", e),
    }
}

pub fn exit() {
    write!(std::io::stdout(), "quitting...").expect("error exiting");
    std::io::stdout().flush().expect("error flushing stdout");
}
