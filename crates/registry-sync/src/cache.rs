// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory mirror of interface-based registry state.
//!
//! ```text
//! RegistrySnapshotCache
//! +-- providers:     CategoryIndex (ServiceKey -> EntryId -> RegistryEntry)
//! +-- consumers:     CategoryIndex
//! +-- routers:       CategoryIndex
//! +-- configurators: CategoryIndex
//! ```
//!
//! All four indexes are created eagerly. Every mutation goes through the
//! category-scoped index.

use crate::category::Category;
use crate::entry::RegistryEntry;
use crate::id::EntryId;
use crate::index::CategoryIndex;
use crate::service_key::ServiceKey;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Full mirror of registry state, one index per category.
#[derive(Debug)]
pub struct RegistrySnapshotCache {
    indexes: [CategoryIndex; 4],
}

impl Default for RegistrySnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrySnapshotCache {
    pub fn new() -> Self {
        Self {
            indexes: Category::ALL.map(CategoryIndex::new),
        }
    }

    /// Index of one category.
    pub fn get(&self, category: Category) -> &CategoryIndex {
        &self.indexes[category.index()]
    }

    /// Remove keys of `interface` in `category` that are absent from `surviving`.
    ///
    /// Covers the case where a service's last instance goes away and the registry
    /// sends nothing for that key at all. Returns the removed keys.
    pub fn reconcile(
        &self,
        category: Category,
        interface: &str,
        surviving: &HashSet<ServiceKey>,
    ) -> Vec<ServiceKey> {
        let removed = self.get(category).retain_interface(interface, surviving);
        if !removed.is_empty() {
            debug!(
                "Reconciled {} stale {} key(s) of {}: {:?}",
                removed.len(),
                category,
                interface,
                removed
            );
        }
        removed
    }

    /// Resolve an entry id within one category.
    pub fn find_by_id(
        &self,
        category: Category,
        id: &EntryId,
    ) -> Option<(ServiceKey, Arc<RegistryEntry>)> {
        self.get(category).find(id)
    }

    /// Total number of entries across all categories.
    pub fn entry_count(&self) -> usize {
        self.indexes.iter().map(CategoryIndex::entry_count).sum()
    }

    /// Drop every entry in every category.
    pub fn clear(&self) {
        for index in &self.indexes {
            index.clear();
        }
    }
}
