// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry client capability.
//!
//! The engine subscribes a [`NotifyListener`] through a [`RegistryClient`] and
//! forwards console writes to it. Concrete registry protocols live behind the
//! trait; [`MemoryRegistry`] is the in-process implementation.

use crate::category::Category;
use crate::entry::{keys, RegistryEntry, EMPTY_PROTOCOL};
use crate::error::SyncError;
use crate::service_key::{ServiceKey, ANY_VALUE};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receiver of full-snapshot notifications.
pub trait NotifyListener: Send + Sync {
    /// `urls` is the complete current membership of every (category, key) it
    /// mentions.
    fn notify(&self, urls: &[String]);
}

/// Registry client operations used by the engine.
pub trait RegistryClient: Send + Sync {
    /// Start delivering notifications matching `query` to `listener`.
    fn subscribe(
        &self,
        query: &SubscribeQuery,
        listener: Arc<dyn NotifyListener>,
    ) -> Result<(), SyncError>;

    /// Stop deliveries for `query`.
    fn unsubscribe(&self, query: &SubscribeQuery) -> Result<(), SyncError>;

    fn register(&self, entry: &RegistryEntry) -> Result<(), SyncError>;

    fn unregister(&self, entry: &RegistryEntry) -> Result<(), SyncError>;
}

/// Admin subscription: every interface, group, version and classifier of the
/// subscribed categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeQuery {
    categories: Vec<Category>,
    entry: RegistryEntry,
}

/// Protocol of the admin subscription record.
pub const ADMIN_PROTOCOL: &str = "admin";

fn local_host() -> IpAddr {
    match local_ip_address::local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Local IP lookup failed ({}), using loopback", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

impl SubscribeQuery {
    pub fn admin(categories: &[Category]) -> Self {
        let mut categories = categories.to_vec();
        categories.sort();
        categories.dedup();
        let category_list = categories
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let entry = RegistryEntry::new(ADMIN_PROTOCOL, local_host().to_string(), 0, "")
            .with_parameter(keys::INTERFACE, ANY_VALUE)
            .with_parameter(keys::GROUP, ANY_VALUE)
            .with_parameter(keys::VERSION, ANY_VALUE)
            .with_parameter(keys::CLASSIFIER, ANY_VALUE)
            .with_parameter(keys::CATEGORY, category_list)
            .with_parameter(keys::ENABLED, ANY_VALUE)
            .with_parameter(keys::CHECK, "false");

        Self { categories, entry }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn accepts(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn entry(&self) -> &RegistryEntry {
        &self.entry
    }
}

impl fmt::Display for SubscribeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entry, f)
    }
}

type Members = BTreeMap<String, RegistryEntry>;

#[derive(Default)]
struct MemoryState {
    // category -> interface -> key -> full string -> entry
    entries: BTreeMap<Category, BTreeMap<String, BTreeMap<ServiceKey, Members>>>,
    listeners: Vec<(SubscribeQuery, Arc<dyn NotifyListener>)>,
}

impl MemoryState {
    /// Notification batch for one (category, interface): all live entries of every
    /// key of the interface, or a wildcard withdrawal record when none remain.
    fn batch(&self, category: Category, interface: &str) -> Vec<String> {
        let urls: Vec<String> = self
            .entries
            .get(&category)
            .and_then(|interfaces| interfaces.get(interface))
            .map(|keys| {
                keys.values()
                    .flat_map(|members| members.keys().cloned())
                    .collect()
            })
            .unwrap_or_default();
        if !urls.is_empty() {
            return urls;
        }
        let withdraw = RegistryEntry::new(EMPTY_PROTOCOL, "0.0.0.0", 0, interface)
            .with_parameter(keys::CATEGORY, category.as_str())
            .with_parameter(keys::GROUP, ANY_VALUE)
            .with_parameter(keys::VERSION, ANY_VALUE);
        vec![withdraw.full_string()]
    }

    fn deliver(&self, category: Category, interface: &str) {
        let batch = self.batch(category, interface);
        for (query, listener) in &self.listeners {
            if query.accepts(category) {
                listener.notify(&batch);
            }
        }
    }
}

/// In-process registry.
///
/// Keeps registered entries per (category, interface, key). Each register or
/// unregister re-notifies subscribers with the full membership of the affected
/// interface. Deliveries happen under the registry lock, so listeners observe
/// them in order and must not call back into the registry.
pub struct MemoryRegistry {
    state: Mutex<MemoryState>,
    available: AtomicBool,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryRegistry")
            .field("categories", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .field("available", &self.is_available())
            .finish()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Registry pre-populated with `urls`. Malformed records are logged and skipped.
    pub fn seeded<S: AsRef<str>>(urls: &[S]) -> Self {
        let registry = Self::new();
        let mut loaded = 0;
        for url in urls {
            match RegistryEntry::parse(url.as_ref()) {
                Ok(entry) => {
                    registry.insert(entry);
                    loaded += 1;
                }
                Err(e) => warn!("Ignoring seed record: {}", e),
            }
        }
        info!("Seeded in-memory registry with {} entr(ies)", loaded);
        registry
    }

    /// Load a seed file: one record per line, blank lines and `#` comments ignored.
    pub fn from_snapshot_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let urls: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        Ok(Self::seeded(&urls))
    }

    /// Simulate an outage: every operation fails with `RegistryUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Number of registered entries.
    pub fn entry_count(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .flat_map(|interfaces| interfaces.values())
            .flat_map(|keys| keys.values())
            .map(Members::len)
            .sum()
    }

    fn check_available(&self) -> Result<(), SyncError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(SyncError::RegistryUnavailable(
                "in-memory registry marked unavailable".into(),
            ))
        }
    }

    fn insert(&self, entry: RegistryEntry) {
        let category = entry.category();
        let key = entry.service_key();
        let interface = key.interface().to_string();
        let mut state = self.state.lock();
        state
            .entries
            .entry(category)
            .or_default()
            .entry(interface.clone())
            .or_default()
            .entry(key)
            .or_default()
            .insert(entry.full_string(), entry);
        state.deliver(category, &interface);
    }
}

impl RegistryClient for MemoryRegistry {
    fn subscribe(
        &self,
        query: &SubscribeQuery,
        listener: Arc<dyn NotifyListener>,
    ) -> Result<(), SyncError> {
        self.check_available()?;
        let mut state = self.state.lock();
        for category in query.categories() {
            if let Some(interfaces) = state.entries.get(category) {
                for interface in interfaces.keys() {
                    listener.notify(&state.batch(*category, interface));
                }
            }
        }
        state.listeners.push((query.clone(), listener));
        info!("Subscribed {}", query);
        Ok(())
    }

    fn unsubscribe(&self, query: &SubscribeQuery) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(q, _)| q != query);
        if state.listeners.len() < before {
            info!("Unsubscribed {}", query);
        }
        Ok(())
    }

    fn register(&self, entry: &RegistryEntry) -> Result<(), SyncError> {
        self.check_available()?;
        debug!("Register {}", entry);
        self.insert(entry.clone());
        Ok(())
    }

    fn unregister(&self, entry: &RegistryEntry) -> Result<(), SyncError> {
        self.check_available()?;
        let category = entry.category();
        let key = entry.service_key();
        let interface = key.interface().to_string();
        let full = entry.full_string();

        let mut state = self.state.lock();
        let removed = match state
            .entries
            .get_mut(&category)
            .and_then(|interfaces| interfaces.get_mut(&interface))
        {
            Some(keys) => {
                let removed = keys
                    .get_mut(&key)
                    .map(|members| members.remove(&full).is_some())
                    .unwrap_or(false);
                if keys.get(&key).is_some_and(Members::is_empty) {
                    keys.remove(&key);
                }
                removed
            }
            None => false,
        };
        if !removed {
            debug!("Unregister of unknown entry {}", full);
            return Ok(());
        }
        if let Some(interfaces) = state.entries.get_mut(&category) {
            if interfaces.get(&interface).is_some_and(BTreeMap::is_empty) {
                interfaces.remove(&interface);
            }
        }
        debug!("Unregister {}", full);
        state.deliver(category, &interface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl NotifyListener for Recorder {
        fn notify(&self, urls: &[String]) {
            self.batches.lock().push(urls.to_vec());
        }
    }

    const P1: &str = "dubbo://10.0.0.1:20880/svc?version=1";
    const P2: &str = "dubbo://10.0.0.2:20880/svc?version=2";

    #[test]
    fn test_admin_query_shape() {
        let query = SubscribeQuery::admin(&[Category::Routers, Category::Providers]);
        let entry = query.entry();
        assert_eq!(entry.protocol(), ADMIN_PROTOCOL);
        assert_eq!(entry.parameter(keys::INTERFACE), Some("*"));
        assert_eq!(entry.parameter(keys::CATEGORY), Some("providers,routers"));
        assert_eq!(entry.parameter(keys::CHECK), Some("false"));
        assert!(query.accepts(Category::Routers));
        assert!(!query.accepts(Category::Consumers));
    }

    #[test]
    fn test_subscribe_delivers_existing_state() {
        let registry = MemoryRegistry::seeded(&[P1, P2, "consumer://10.0.0.9/svc?category=consumers"]);
        let recorder = Arc::new(Recorder::default());
        registry
            .subscribe(&SubscribeQuery::admin(&[Category::Providers]), recorder.clone())
            .unwrap();

        let batches = recorder.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_unregister_last_entry_sends_withdrawal() {
        let registry = MemoryRegistry::seeded(&[P1]);
        let recorder = Arc::new(Recorder::default());
        registry
            .subscribe(&SubscribeQuery::admin(&Category::ALL), recorder.clone())
            .unwrap();

        registry.unregister(&RegistryEntry::parse(P1).unwrap()).unwrap();

        let batches = recorder.batches.lock();
        let last = batches.last().unwrap();
        assert_eq!(last.len(), 1);
        assert!(last[0].starts_with("empty://"));
        assert!(last[0].contains("group=*"));
        assert_eq!(registry.entry_count(), 0);
    }

    #[test]
    fn test_register_notifies_whole_interface() {
        let registry = MemoryRegistry::seeded(&[P1]);
        let recorder = Arc::new(Recorder::default());
        registry
            .subscribe(&SubscribeQuery::admin(&Category::ALL), recorder.clone())
            .unwrap();

        registry.register(&RegistryEntry::parse(P2).unwrap()).unwrap();

        let batches = recorder.batches.lock();
        assert_eq!(batches.last().unwrap().len(), 2);
    }

    #[test]
    fn test_unavailable_registry_fails() {
        let registry = MemoryRegistry::new();
        registry.set_available(false);
        let result = registry.subscribe(
            &SubscribeQuery::admin(&Category::ALL),
            Arc::new(Recorder::default()),
        );
        assert!(matches!(result, Err(SyncError::RegistryUnavailable(_))));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry = MemoryRegistry::new();
        let query = SubscribeQuery::admin(&Category::ALL);
        let recorder = Arc::new(Recorder::default());
        registry.subscribe(&query, recorder.clone()).unwrap();
        registry.unsubscribe(&query).unwrap();
        assert_eq!(registry.subscriber_count(), 0);

        registry.register(&RegistryEntry::parse(P1).unwrap()).unwrap();
        assert!(recorder.batches.lock().is_empty());
    }
}
