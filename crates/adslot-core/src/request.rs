//! What a host asks the cache to load or show.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default provider load timeout in milliseconds.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5_000;

/// Format of the ad to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdKind {
    #[default]
    Interstitial,
    Rewarded,
    RewardedInterstitial,
    AppOpen,
}

impl fmt::Display for AdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdKind::Interstitial => write!(f, "interstitial"),
            AdKind::Rewarded => write!(f, "rewarded"),
            AdKind::RewardedInterstitial => write!(f, "rewarded_interstitial"),
            AdKind::AppOpen => write!(f, "app_open"),
        }
    }
}

/// What the UI host asks the cache to load or show.
///
/// `placement_id` is the cache key. `identifier` only labels notifications
/// back to the caller, so several specs may share one placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRequestSpec {
    identifier: String,
    placement_id: String,
    #[serde(default)]
    ad_kind: AdKind,
    #[serde(default = "default_load_timeout_ms")]
    load_timeout_ms: u64,
}

fn default_load_timeout_ms() -> u64 {
    DEFAULT_LOAD_TIMEOUT_MS
}

impl AdRequestSpec {
    pub fn new(identifier: impl Into<String>, placement_id: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            placement_id: placement_id.into(),
            ad_kind: AdKind::default(),
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
        }
    }

    pub fn with_kind(mut self, kind: AdKind) -> Self {
        self.ad_kind = kind;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn placement_id(&self) -> &str {
        &self.placement_id
    }

    pub fn ad_kind(&self) -> AdKind {
        self.ad_kind
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Whether the placement key is usable for lookup.
    pub fn has_placement(&self) -> bool {
        !self.placement_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = AdRequestSpec::new("main", "ca-app-pub-1/2");
        assert_eq!(spec.ad_kind(), AdKind::Interstitial);
        assert_eq!(spec.load_timeout(), Duration::from_millis(5000));
        assert!(spec.has_placement());
    }

    #[test]
    fn test_blank_placement() {
        assert!(!AdRequestSpec::new("main", "").has_placement());
        assert!(!AdRequestSpec::new("main", "   ").has_placement());
    }

    #[test]
    fn test_with_overrides() {
        let spec = AdRequestSpec::new("reward", "p9")
            .with_kind(AdKind::Rewarded)
            .with_load_timeout(Duration::from_secs(2));
        assert_eq!(spec.ad_kind(), AdKind::Rewarded);
        assert_eq!(spec.load_timeout(), Duration::from_secs(2));
        assert_eq!(spec.identifier(), "reward");
    }
}
