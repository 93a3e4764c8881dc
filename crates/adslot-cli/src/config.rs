//! CLI configuration management.

use adslot_cache::{CacheConfig, SimulatedConfig};
use adslot_core::{AdKind, AdRequestSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Cache behaviour.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Simulated provider behaviour.
    #[serde(default)]
    pub provider: SimulatedConfig,
    /// Known placements, addressable by identifier or placement id.
    #[serde(default = "default_placements")]
    pub placements: Vec<AdRequestSpec>,
}

fn default_placements() -> Vec<AdRequestSpec> {
    vec![
        AdRequestSpec::new("level-complete", "demo/interstitial"),
        AdRequestSpec::new("extra-life", "demo/rewarded").with_kind(AdKind::Rewarded),
    ]
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            provider: SimulatedConfig::default(),
            placements: default_placements(),
        }
    }
}

impl CliConfig {
    /// Load configuration from the user config directory.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_yaml::from_str(content)?;
        config.cache.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("dev", "adslot", "adslot")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Find a configured placement by identifier, then by placement id.
    pub fn find_placement(&self, name: &str) -> Option<&AdRequestSpec> {
        self.placements
            .iter()
            .find(|spec| spec.identifier() == name)
            .or_else(|| self.placements.iter().find(|spec| spec.placement_id() == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = CliConfig::from_yaml("{}").unwrap();
        assert_eq!(config.placements.len(), 2);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.provider, SimulatedConfig::default());
    }

    #[test]
    fn test_parse_placements() {
        let yaml = r#"
provider:
  latency_ms: 50
  load_error_code: 3
placements:
  - identifier: home
    placement_id: unit/home
    ad_kind: app_open
    load_timeout_ms: 1200
"#;
        let config = CliConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.provider.latency_ms, 50);
        assert_eq!(config.provider.load_error_code, Some(3));

        let home = config.find_placement("home").unwrap();
        assert_eq!(home.placement_id(), "unit/home");
        assert_eq!(home.ad_kind(), AdKind::AppOpen);
        assert_eq!(home.load_timeout(), Duration::from_millis(1200));
    }

    #[test]
    fn test_invalid_cache_section_rejected() {
        let yaml = "cache:\n  freshness_window_ms: 0\n";
        assert!(CliConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_find_placement_by_id() {
        let config = CliConfig::default();
        let spec = config.find_placement("demo/rewarded").unwrap();
        assert_eq!(spec.identifier(), "extra-life");
        assert!(config.find_placement("missing").is_none());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CliConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = CliConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.placements, config.placements);
    }
}
