//! Persistent CLI settings (defaults for new timers, debouncer, throttler)

use repeat_types::{Interval, ThrottleMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const APP_NAME: &str = "repeat";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[source] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Interval used by `once` / `every` when none is given
    #[serde(default)]
    pub default_interval: Interval,
    /// Leeway handed to the clock, in milliseconds
    #[serde(default)]
    pub tolerance_ms: u64,
    #[serde(default = "default_debounce_delay")]
    pub debounce_delay: Interval,
    #[serde(default = "default_throttle_interval")]
    pub throttle_interval: Interval,
    #[serde(default)]
    pub throttle_mode: ThrottleMode,
    #[serde(default)]
    pub immediate_fire: bool,
}

fn default_debounce_delay() -> Interval {
    Interval::Milliseconds(300)
}

fn default_throttle_interval() -> Interval {
    Interval::Milliseconds(500)
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_interval: Interval::default(),
            tolerance_ms: 0,
            debounce_delay: default_debounce_delay(),
            throttle_interval: default_throttle_interval(),
            throttle_mode: ThrottleMode::Fixed,
            immediate_fire: false,
        }
    }
}

impl CliConfig {
    /// Load from the platform config dir, falling back to defaults
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Using default configuration");
            Self::default()
        })
    }

    pub fn try_load() -> Result<Self, ConfigError> {
        confy::load(APP_NAME, None).map_err(ConfigError::Load)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, self).map_err(ConfigError::Save)
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_millis(self.tolerance_ms)
    }
}
