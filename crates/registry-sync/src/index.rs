// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CategoryIndex - concurrent `ServiceKey -> (EntryId -> RegistryEntry)` store
//!
//! One index per category. The inner maps are immutable once installed: a
//! replace builds the complete new map first and swaps the `Arc` in a single
//! insert, so a reader holding a snapshot sees either the fully-old or the
//! fully-new membership of a key, never a mix.
//!
//! Uses DashMap for sharded concurrent access; updates to different keys do not
//! contend.

use crate::category::Category;
use crate::entry::RegistryEntry;
use crate::id::EntryId;
use crate::service_key::{ServiceKey, ServiceKeyPattern};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Membership of one service key.
pub type EntryMap = HashMap<EntryId, Arc<RegistryEntry>>;

/// Concurrent store for one category.
#[derive(Debug)]
pub struct CategoryIndex {
    category: Category,
    services: DashMap<ServiceKey, Arc<EntryMap>>,
}

impl CategoryIndex {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            services: DashMap::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Install `entries` as the complete state of `key`.
    ///
    /// Returns the previous membership, if any.
    pub fn replace_service(&self, key: ServiceKey, entries: EntryMap) -> Option<Arc<EntryMap>> {
        self.services.insert(key, Arc::new(entries))
    }

    /// Drop every entry of `key`.
    pub fn remove_service(&self, key: &ServiceKey) -> Option<Arc<EntryMap>> {
        self.services.remove(key).map(|(_, entries)| entries)
    }

    /// Drop every key matched by `pattern` (all groups and/or versions of one
    /// interface). Returns the removed keys.
    ///
    /// O(number of keys in this category).
    pub fn remove_matching(&self, pattern: &ServiceKeyPattern) -> Vec<ServiceKey> {
        let mut removed = Vec::new();
        self.services.retain(|key, _| {
            if pattern.matches(key) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop keys of `interface` that are not in `surviving`. Returns the removed keys.
    pub fn retain_interface(
        &self,
        interface: &str,
        surviving: &HashSet<ServiceKey>,
    ) -> Vec<ServiceKey> {
        let mut removed = Vec::new();
        self.services.retain(|key, _| {
            if key.interface() == interface && !surviving.contains(key) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Snapshot of one key's membership.
    pub fn get(&self, key: &ServiceKey) -> Option<Arc<EntryMap>> {
        self.services.get(key).map(|entries| entries.value().clone())
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.services.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of every key and its membership.
    pub fn snapshot(&self) -> Vec<(ServiceKey, Arc<EntryMap>)> {
        self.services
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Flattened snapshot of every entry in the category.
    pub fn entries(&self) -> EntryMap {
        let mut all = EntryMap::new();
        for (_, entries) in self.snapshot() {
            all.extend(entries.iter().map(|(id, e)| (id.clone(), e.clone())));
        }
        all
    }

    /// Find an entry by id, scanning all keys.
    pub fn find(&self, id: &EntryId) -> Option<(ServiceKey, Arc<RegistryEntry>)> {
        self.services.iter().find_map(|e| {
            e.value()
                .get(id)
                .map(|entry| (e.key().clone(), entry.clone()))
        })
    }

    /// Number of service keys.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total number of entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.services.iter().map(|e| e.value().len()).sum()
    }

    pub fn clear(&self) {
        self.services.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_key::Component;

    fn entry(host: &str, key: &ServiceKey) -> (EntryId, Arc<RegistryEntry>) {
        let mut e = RegistryEntry::new("dubbo", host, 20880, key.interface());
        if let Some(g) = key.group() {
            e = e.with_parameter("group", g);
        }
        if let Some(v) = key.version() {
            e = e.with_parameter("version", v);
        }
        (EntryId::digest(&e.full_string()), Arc::new(e))
    }

    fn map_of(key: &ServiceKey, hosts: &[&str]) -> EntryMap {
        hosts.iter().map(|h| entry(h, key)).collect()
    }

    #[test]
    fn test_replace_and_get() {
        let index = CategoryIndex::new(Category::Providers);
        let key = ServiceKey::new("svc", None, Some("1.0"));

        assert!(index.replace_service(key.clone(), map_of(&key, &["a", "b"])).is_none());
        assert_eq!(index.get(&key).unwrap().len(), 2);

        let previous = index.replace_service(key.clone(), map_of(&key, &["a"])).unwrap();
        assert_eq!(previous.len(), 2);
        assert_eq!(index.get(&key).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_replace() {
        let index = CategoryIndex::new(Category::Providers);
        let key = ServiceKey::interface_only("svc");
        index.replace_service(key.clone(), map_of(&key, &["a", "b", "c"]));

        let held = index.get(&key).unwrap();
        index.replace_service(key.clone(), map_of(&key, &["z"]));

        assert_eq!(held.len(), 3);
        assert_eq!(index.get(&key).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_service() {
        let index = CategoryIndex::new(Category::Consumers);
        let key = ServiceKey::interface_only("svc");
        index.replace_service(key.clone(), map_of(&key, &["a"]));

        assert!(index.remove_service(&key).is_some());
        assert!(index.get(&key).is_none());
        assert!(index.remove_service(&key).is_none());
    }

    #[test]
    fn test_remove_matching_wildcard() {
        let index = CategoryIndex::new(Category::Providers);
        let keys = [
            ServiceKey::new("svc", Some("a"), Some("1")),
            ServiceKey::new("svc", Some("b"), Some("2")),
            ServiceKey::interface_only("svc"),
            ServiceKey::new("other", Some("a"), Some("1")),
        ];
        for key in &keys {
            index.replace_service(key.clone(), map_of(key, &["h"]));
        }

        let pattern = ServiceKeyPattern {
            interface: "svc".into(),
            group: Component::Any,
            version: Component::Any,
        };
        let mut removed = index.remove_matching(&pattern);
        removed.sort();

        assert_eq!(removed.len(), 3);
        assert_eq!(index.keys(), vec![keys[3].clone()]);
    }

    #[test]
    fn test_retain_interface() {
        let index = CategoryIndex::new(Category::Providers);
        let v1 = ServiceKey::new("svc", None, Some("1"));
        let v2 = ServiceKey::new("svc", None, Some("2"));
        let other = ServiceKey::interface_only("other");
        for key in [&v1, &v2, &other] {
            index.replace_service(key.clone(), map_of(key, &["h"]));
        }

        let surviving: HashSet<ServiceKey> = [v1.clone()].into_iter().collect();
        let removed = index.retain_interface("svc", &surviving);

        assert_eq!(removed, vec![v2]);
        assert!(index.get(&v1).is_some());
        assert!(index.get(&other).is_some());
    }

    #[test]
    fn test_find_and_counts() {
        let index = CategoryIndex::new(Category::Providers);
        let k1 = ServiceKey::interface_only("svc1");
        let k2 = ServiceKey::interface_only("svc2");
        index.replace_service(k1.clone(), map_of(&k1, &["a", "b"]));
        index.replace_service(k2.clone(), map_of(&k2, &["c"]));

        assert_eq!(index.len(), 2);
        assert_eq!(index.entry_count(), 3);
        assert_eq!(index.entries().len(), 3);

        let (id, _) = entry("c", &k2);
        let (found_key, found) = index.find(&id).unwrap();
        assert_eq!(found_key, k2);
        assert_eq!(found.host(), "c");

        index.clear();
        assert!(index.is_empty());
    }
}
