// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NotificationReducer - folds registry notifications into the snapshot cache.
//!
//! A notify batch may mix categories and services. For every (category, key) it
//! mentions, the batch carries the complete current membership of that key.
//!
//! # Algorithm
//!
//! ```text
//! 1. classify each record      -> Upsert | Withdraw
//! 2. apply withdrawals         -> remove_service / remove_matching
//! 3. group upserts             -> (category, ServiceKey) -> EntryId -> entry
//! 4. install each group        -> replace_service (full replace)
//! 5. reconcile per interface   -> drop keys of the interface absent from the batch
//! ```

use crate::cache::RegistrySnapshotCache;
use crate::category::Category;
use crate::entry::RegistryEntry;
use crate::id::StableIdAssigner;
use crate::index::EntryMap;
use crate::notification::NotificationEntry;
use crate::registry::NotifyListener;
use crate::service_key::ServiceKey;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one notify batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySummary {
    /// (category, key) groups installed.
    pub groups: usize,
    /// Entries installed across all groups.
    pub entries: usize,
    /// Keys removed by explicit withdrawal records.
    pub withdrawn: usize,
    /// Keys removed by reconciliation.
    pub reconciled: usize,
    /// Malformed records skipped.
    pub skipped: usize,
}

impl NotifySummary {
    pub fn is_noop(&self) -> bool {
        self.groups == 0 && self.withdrawn == 0 && self.reconciled == 0
    }
}

/// Applies notification batches to a [`RegistrySnapshotCache`].
#[derive(Debug)]
pub struct NotificationReducer {
    cache: Arc<RegistrySnapshotCache>,
    ids: StableIdAssigner,
}

impl NotificationReducer {
    pub fn new(cache: Arc<RegistrySnapshotCache>) -> Self {
        Self {
            cache,
            ids: StableIdAssigner::new(),
        }
    }

    pub fn cache(&self) -> &Arc<RegistrySnapshotCache> {
        &self.cache
    }

    pub fn ids(&self) -> &StableIdAssigner {
        &self.ids
    }

    /// Parse raw records and apply them. Malformed records are logged and skipped.
    pub fn notify_urls<S: AsRef<str>>(&self, urls: &[S]) -> NotifySummary {
        let mut skipped = 0;
        let mut entries = Vec::with_capacity(urls.len());
        for url in urls {
            match RegistryEntry::parse(url.as_ref()) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Skipping malformed registry record: {}", e);
                    skipped += 1;
                }
            }
        }
        let mut summary = self.notify_entries(entries);
        summary.skipped = skipped;
        summary
    }

    /// Apply a batch of parsed entries.
    pub fn notify_entries(&self, entries: Vec<RegistryEntry>) -> NotifySummary {
        let mut summary = NotifySummary::default();
        let mut groups: BTreeMap<(Category, ServiceKey), EntryMap> = BTreeMap::new();
        let mut withdrawals = Vec::new();

        for entry in entries {
            match NotificationEntry::classify(entry) {
                NotificationEntry::Withdraw { category, pattern } => {
                    withdrawals.push((category, pattern));
                }
                NotificationEntry::Upsert {
                    category,
                    key,
                    entry,
                } => {
                    let id = self.ids.assign(&entry.full_string());
                    groups
                        .entry((category, key))
                        .or_default()
                        .insert(id, Arc::new(entry));
                }
            }
        }

        for (category, pattern) in withdrawals {
            let index = self.cache.get(category);
            let removed = match pattern.as_exact_key() {
                Some(key) => index.remove_service(&key).map(|_| vec![key]).unwrap_or_default(),
                None => index.remove_matching(&pattern),
            };
            if !removed.is_empty() {
                debug!("Withdrew {} {:?}", category, removed);
            }
            summary.withdrawn += removed.len();
        }

        let mut written: HashMap<(Category, String), HashSet<ServiceKey>> = HashMap::new();
        for ((category, key), members) in groups {
            summary.groups += 1;
            summary.entries += members.len();
            written
                .entry((category, key.interface().to_string()))
                .or_default()
                .insert(key.clone());
            self.cache.get(category).replace_service(key, members);
        }

        for ((category, interface), surviving) in &written {
            summary.reconciled += self.cache.reconcile(*category, interface, surviving).len();
        }

        debug!(
            "Notify applied: {} group(s), {} entr(ies), {} withdrawn, {} reconciled",
            summary.groups, summary.entries, summary.withdrawn, summary.reconciled
        );
        summary
    }
}

impl NotifyListener for NotificationReducer {
    fn notify(&self, urls: &[String]) {
        let summary = self.notify_urls(urls);
        if summary.skipped > 0 {
            warn!("{} malformed record(s) skipped in notify batch", summary.skipped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntryId;

    const X: &str = "dubbo://10.0.0.1:20880/svcA?application=app&version=1";
    const Y: &str = "dubbo://10.0.0.2:20880/svcA?application=app&version=1";

    fn reducer() -> NotificationReducer {
        NotificationReducer::new(Arc::new(RegistrySnapshotCache::new()))
    }

    fn key_v1() -> ServiceKey {
        ServiceKey::new("svcA", None, Some("1"))
    }

    fn providers_of(reducer: &NotificationReducer, key: &ServiceKey) -> EntryMap {
        reducer
            .cache()
            .get(Category::Providers)
            .get(key)
            .map(|m| (*m).clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_idempotent_notify() {
        let r = reducer();
        r.notify_urls(&[X, Y]);
        let first = providers_of(&r, &key_v1());
        r.notify_urls(&[X, Y]);
        let second = providers_of(&r, &key_v1());

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(r.ids().len(), 2);
    }

    #[test]
    fn test_stable_id_when_group_grows() {
        let r = reducer();
        r.notify_urls(&[X]);
        let before: Vec<EntryId> = providers_of(&r, &key_v1()).into_keys().collect();

        r.notify_urls(&[X, Y]);
        let after = providers_of(&r, &key_v1());

        assert_eq!(after.len(), 2);
        assert!(after.contains_key(&before[0]));
    }

    #[test]
    fn test_subset_replaces_membership() {
        let r = reducer();
        r.notify_urls(&[X, Y]);
        r.notify_urls(&[X]);
        let members = providers_of(&r, &key_v1());

        assert_eq!(members.len(), 1);
        assert_eq!(members.values().next().unwrap().host(), "10.0.0.1");
    }

    #[test]
    fn test_exact_withdrawal() {
        let r = reducer();
        r.notify_urls(&[X, Y]);
        let summary = r.notify_urls(&["empty://0.0.0.0/svcA?version=1&category=providers"]);

        assert_eq!(summary.withdrawn, 1);
        assert!(r.cache().get(Category::Providers).get(&key_v1()).is_none());
    }

    #[test]
    fn test_wildcard_withdrawal_removes_all_versions() {
        let r = reducer();
        r.notify_urls(&[
            X,
            "dubbo://10.0.0.3:20880/svcA?version=2&group=g",
            "dubbo://10.0.0.4:20880/svcB?version=1",
        ]);
        let summary = r.notify_urls(&["empty://0.0.0.0/svcA?group=*&version=*"]);

        assert_eq!(summary.withdrawn, 2);
        let keys = r.cache().get(Category::Providers).keys();
        assert_eq!(keys, vec![ServiceKey::new("svcB", None, Some("1"))]);
    }

    #[test]
    fn test_categories_are_isolated() {
        let r = reducer();
        r.notify_urls(&["consumer://10.0.0.9/svcA?category=consumers&version=1"]);
        r.notify_urls(&[X]);
        r.notify_urls(&["empty://0.0.0.0/svcA?version=1&category=providers"]);

        assert!(r.cache().get(Category::Providers).is_empty());
        assert_eq!(r.cache().get(Category::Consumers).entry_count(), 1);
        assert!(r.cache().get(Category::Routers).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let r = reducer();
        let summary = r.notify_urls(&["not a url", X, "dubbo://h:port/svc"]);

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.entries, 1);
        assert_eq!(providers_of(&r, &key_v1()).len(), 1);
    }

    #[test]
    fn test_reconcile_drops_versions_missing_from_batch() {
        let r = reducer();
        r.notify_urls(&[X, "dubbo://10.0.0.3:20880/svcA?version=2"]);
        let summary = r.notify_urls(&[X]);

        assert_eq!(summary.reconciled, 1);
        assert_eq!(r.cache().get(Category::Providers).keys(), vec![key_v1()]);
    }

    #[test]
    fn test_mixed_batch_groups_per_category_and_key() {
        let r = reducer();
        let summary = r.notify_urls(&[
            X,
            Y,
            "route://0.0.0.0/svcA?category=routers&version=1&name=r1",
            "override://0.0.0.0/svcB?category=configurators",
        ]);

        assert_eq!(summary.groups, 3);
        assert_eq!(summary.entries, 4);
        assert_eq!(r.cache().get(Category::Routers).entry_count(), 1);
        assert_eq!(r.cache().get(Category::Configurators).entry_count(), 1);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let r = reducer();
        let summary = r.notify_urls::<&str>(&[]);
        assert!(summary.is_noop());
    }
}
