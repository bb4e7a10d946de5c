// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sync engine configuration.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Config-center backend selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigCenterConfig {
    /// Process-local store, lost on exit.
    #[default]
    Memory,
    /// One file per key under `root/<group>/`.
    File {
        #[serde(default)]
        root: Option<PathBuf>,
    },
}

/// Application-first (instance-based) discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiscoveryConfig {
    /// Mirror instance-based registrations as well as interface-based ones
    #[serde(default)]
    pub enabled: bool,

    /// Refresh interval of watched applications (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for InstanceDiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl InstanceDiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Categories to subscribe to (default: all four)
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,

    /// Config-center backend
    #[serde(default)]
    pub config_center: ConfigCenterConfig,

    /// Instance-based discovery
    #[serde(default)]
    pub instance_discovery: InstanceDiscoveryConfig,

    /// File with one registry record per line, loaded into the in-memory registry
    #[serde(default)]
    pub seed_snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            config_center: ConfigCenterConfig::default(),
            instance_discovery: InstanceDiscoveryConfig::default(),
            seed_snapshot: None,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("No categories configured".into()));
        }
        if self.instance_discovery.enabled && self.instance_discovery.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs cannot be 0 when instance discovery is enabled".into(),
            ));
        }
        if let ConfigCenterConfig::File { root: None } = self.config_center {
            return Err(ConfigError::Invalid(
                "File config center requires a root directory".into(),
            ));
        }
        Ok(())
    }

    /// Subscribed categories, deduplicated, in canonical order.
    pub fn subscribed_categories(&self) -> Vec<Category> {
        let mut categories = self.categories.clone();
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.categories.len(), 4);
        assert_eq!(config.config_center, ConfigCenterConfig::Memory);
        assert!(!config.instance_discovery.enabled);
    }

    #[test]
    fn test_parse_minimal_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_full_json() {
        let json = r#"{
            "categories": ["providers", "routers"],
            "config_center": { "type": "file", "root": "/var/lib/registry-sync" },
            "instance_discovery": { "enabled": true, "poll_interval_secs": 10 },
            "seed_snapshot": "snapshot.txt",
            "log_level": "debug"
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.categories, vec![Category::Providers, Category::Routers]);
        assert_eq!(
            config.config_center,
            ConfigCenterConfig::File {
                root: Some(PathBuf::from("/var/lib/registry-sync"))
            }
        );
        assert_eq!(config.instance_discovery.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.seed_snapshot, Some(PathBuf::from("snapshot.txt")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = EngineConfig {
            categories: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.categories = vec![Category::Providers];
        config.instance_discovery = InstanceDiscoveryConfig {
            enabled: true,
            poll_interval_secs: 0,
        };
        assert!(config.validate().is_err());

        config.instance_discovery.enabled = false;
        config.config_center = ConfigCenterConfig::File { root: None };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let config = EngineConfig {
            categories: vec![Category::Consumers],
            log_level: "warn".into(),
            ..Default::default()
        };
        config.to_file(file.path()).unwrap();

        let loaded = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_subscribed_categories_dedup() {
        let config = EngineConfig {
            categories: vec![Category::Routers, Category::Providers, Category::Routers],
            ..Default::default()
        };
        assert_eq!(
            config.subscribed_categories(),
            vec![Category::Providers, Category::Routers]
        );
    }
}
