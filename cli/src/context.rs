use crate::config::CliConfig;
use repeat_core::{Debouncer, Throttler, Timer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Holds all shared state for the CLI application.
/// This is a lightweight container - logic lives in the commands.
#[derive(Clone)]
pub struct CliContext {
    pub config: Arc<RwLock<CliConfig>>,
    /// Timers created from the prompt, keyed by timer id
    pub timers: Arc<RwLock<BTreeMap<u64, Timer>>>,
    /// Created on first `debounce`
    pub debouncer: Arc<Mutex<Option<Debouncer>>>,
    /// Created on first `throttle`
    pub throttler: Arc<Mutex<Option<Throttler>>>,
}

impl CliContext {
    pub fn new() -> Self {
        Self::with_config(CliConfig::load())
    }

    pub fn with_config(config: CliConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            timers: Arc::new(RwLock::new(BTreeMap::new())),
            debouncer: Arc::new(Mutex::new(None)),
            throttler: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for CliContext {
    fn default() -> Self {
        Self::new()
    }
}
