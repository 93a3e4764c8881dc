//! Configuration for the ad lifecycle cache.

use adslot_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a loaded ad before it must be reloaded.
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,
    /// Start a background load when `show` finds nothing usable.
    #[serde(default = "default_prefetch_on_miss")]
    pub prefetch_on_miss: bool,
    /// Name given to a dedicated UI thread, when the host asks for one.
    #[serde(default = "default_ui_thread_name")]
    pub ui_thread_name: String,
}

fn default_freshness_window_ms() -> u64 {
    3_600_000 // 1 hour
}

fn default_prefetch_on_miss() -> bool {
    true
}

fn default_ui_thread_name() -> String {
    "adslot-ui".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: default_freshness_window_ms(),
            prefetch_on_miss: default_prefetch_on_miss(),
            ui_thread_name: default_ui_thread_name(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.freshness_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "freshness_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.ui_thread_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "ui_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }

    /// Set the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window_ms = window.as_millis() as u64;
        self
    }

    /// Enable or disable prefetch on a show miss.
    pub fn with_prefetch_on_miss(mut self, enable: bool) -> Self {
        self.prefetch_on_miss = enable;
        self
    }

    /// Set the UI thread name.
    pub fn with_ui_thread_name(mut self, name: impl Into<String>) -> Self {
        self.ui_thread_name = name.into();
        self
    }
}
