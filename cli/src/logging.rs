//! Logging setup for the CLI
//!
//! Logs go to stderr so they do not interleave with REPL output lines.
//! Set `DEBUG_LOGGING=1` to enable debug output for repeat crates.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init() {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let filter_directive = if debug_logging {
        "info,repeat_core=debug,repeat_cli=debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(EnvFilter::new(filter_directive))
        .init();

    tracing::debug!(debug_logging, "repeat logging initialized");
}
