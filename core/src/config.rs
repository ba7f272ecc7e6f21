//! Repository settings loaded from an optional `flux.toml`

use crate::error::Result;
use crate::lock::LockConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "flux.toml";

/// Settings for one repository. Every field has a default, so a missing
/// `flux.toml` is equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lock: LockSettings,
}

/// `[lock]` section of `flux.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub timeout_secs: f64,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub stale_after_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        let defaults = LockConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs_f64(),
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            stale_after_secs: defaults.stale_after.as_secs(),
        }
    }
}

impl LockSettings {
    pub fn to_lock_config(&self) -> LockConfig {
        LockConfig {
            timeout: Duration::from_secs_f64(self.timeout_secs),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            stale_after: Duration::from_secs(self.stale_after_secs),
        }
    }
}

impl Config {
    /// Load settings from `<root>/flux.toml`, defaulting when absent.
    pub fn load(repo_root: &Path) -> Result<Config> {
        let path = repo_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }
}
