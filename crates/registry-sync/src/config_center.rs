// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Config-center capability.
//!
//! A grouped string key/value store used by the dynamic-configuration path
//! (route and override rules). Backends are selected at startup from
//! [`ConfigCenterConfig`] through [`open`].

use crate::config::ConfigCenterConfig;
use dashmap::DashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Group used when the caller does not name one.
pub const DEFAULT_GROUP: &str = "dubbo";

/// Config-center errors.
#[derive(Debug, Error)]
pub enum ConfigCenterError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid config path segment {0:?}")]
    InvalidKey(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Uniform interface over config-center backends.
pub trait ConfigCenter: Send + Sync {
    /// Connect / prepare the backend. Called once at engine startup.
    fn init(&self) -> Result<(), ConfigCenterError>;

    fn get_config(&self, group: &str, key: &str) -> Result<Option<String>, ConfigCenterError>;

    fn set_config(&self, group: &str, key: &str, value: &str) -> Result<(), ConfigCenterError>;

    /// Returns `true` if a value was removed.
    fn delete_config(&self, group: &str, key: &str) -> Result<bool, ConfigCenterError>;
}

fn check_segment(segment: &str) -> Result<(), ConfigCenterError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(ConfigCenterError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

/// In-process backend.
#[derive(Debug, Default)]
pub struct MemoryConfigCenter {
    values: DashMap<(String, String), String>,
}

impl MemoryConfigCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigCenter for MemoryConfigCenter {
    fn init(&self) -> Result<(), ConfigCenterError> {
        Ok(())
    }

    fn get_config(&self, group: &str, key: &str) -> Result<Option<String>, ConfigCenterError> {
        check_segment(group)?;
        check_segment(key)?;
        Ok(self
            .values
            .get(&(group.to_string(), key.to_string()))
            .map(|v| v.value().clone()))
    }

    fn set_config(&self, group: &str, key: &str, value: &str) -> Result<(), ConfigCenterError> {
        check_segment(group)?;
        check_segment(key)?;
        self.values
            .insert((group.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn delete_config(&self, group: &str, key: &str) -> Result<bool, ConfigCenterError> {
        check_segment(group)?;
        check_segment(key)?;
        Ok(self
            .values
            .remove(&(group.to_string(), key.to_string()))
            .is_some())
    }
}

/// Directory-backed store: `<root>/<group>/<key>` holds the value.
#[derive(Debug)]
pub struct FileConfigCenter {
    root: PathBuf,
}

impl FileConfigCenter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, group: &str, key: &str) -> Result<PathBuf, ConfigCenterError> {
        check_segment(group)?;
        check_segment(key)?;
        Ok(self.root.join(group).join(key))
    }
}

impl ConfigCenter for FileConfigCenter {
    fn init(&self) -> Result<(), ConfigCenterError> {
        std::fs::create_dir_all(&self.root)?;
        info!("File config center at {}", self.root.display());
        Ok(())
    }

    fn get_config(&self, group: &str, key: &str) -> Result<Option<String>, ConfigCenterError> {
        let path = self.path_of(group, key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_config(&self, group: &str, key: &str, value: &str) -> Result<(), ConfigCenterError> {
        let path = self.path_of(group, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, value)?;
        debug!("Wrote config {}/{}", group, key);
        Ok(())
    }

    fn delete_config(&self, group: &str, key: &str) -> Result<bool, ConfigCenterError> {
        let path = self.path_of(group, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Build the backend selected by `config`. The backend is not initialised.
pub fn open(config: &ConfigCenterConfig) -> Result<Arc<dyn ConfigCenter>, ConfigCenterError> {
    match config {
        ConfigCenterConfig::Memory => Ok(Arc::new(MemoryConfigCenter::new())),
        ConfigCenterConfig::File { root: Some(root) } => Ok(Arc::new(FileConfigCenter::new(root))),
        ConfigCenterConfig::File { root: None } => Err(ConfigCenterError::Unavailable(
            "file config center without root".into(),
        )),
    }
}
