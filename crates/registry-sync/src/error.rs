// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine-level errors.

use crate::category::Category;
use crate::config::ConfigError;
use crate::config_center::ConfigCenterError;
use crate::entry::EntryParseError;
use crate::id::EntryId;
use thiserror::Error;

/// Errors surfaced by the sync engine and its query/write paths.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed registry record: {0}")]
    Parse(#[from] EntryParseError),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Config center error: {0}")]
    ConfigCenter(#[from] ConfigCenterError),

    /// The addressed entry disappeared between read and write.
    #[error("{category} entry {id} was changed concurrently")]
    Conflict { category: Category, id: EntryId },

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Engine already shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True when re-querying and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
