pub mod commands;
pub mod config;
pub mod context;
pub mod logging;
pub mod repl;

pub use context::CliContext;
pub use repl::readline;
