// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stable entry identifiers.
//!
//! Every distinct full string gets one short id for the lifetime of the process.
//! The id is the middle 16 hex characters of the MD5 digest of the full string.
//! The mapping is memoised: an unchanged entry keeps its id across notifications.

use dashmap::DashMap;
use md5::{Digest, Md5};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Short stable identifier of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(Arc<str>);

impl EntryId {
    /// Digest a full string into an id (no memoisation).
    pub fn digest(full_string: &str) -> Self {
        let mut hasher = Md5::new();
        hasher.update(full_string.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(Arc::from(&digest[8..24]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Memoising id assigner.
///
/// No eviction: the map grows with the number of distinct full strings ever
/// observed.
#[derive(Debug, Default)]
pub struct StableIdAssigner {
    ids: DashMap<Arc<str>, EntryId>,
}

impl StableIdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `full_string`, computing and recording it on first sight.
    ///
    /// Concurrent first sights of the same string all observe the id that won
    /// the insert.
    pub fn assign(&self, full_string: &str) -> EntryId {
        if let Some(id) = self.ids.get(full_string) {
            return id.clone();
        }
        let candidate = EntryId::digest(full_string);
        self.ids
            .entry(Arc::from(full_string))
            .or_insert(candidate)
            .clone()
    }

    /// Number of distinct full strings seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
