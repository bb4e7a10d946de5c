// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance-based (application-first) discovery mirror.
//!
//! ```text
//! InstanceSnapshotCache (providers only)
//! +-- application -> ServiceKey -> [InstanceEndpoint]
//! ```
//!
//! - **Atomic swap**: the whole mirror sits behind an `ArcSwap`; every address
//!   change publishes a new snapshot, so readers never lock and never see a
//!   half-applied update.
//! - **No ids**: endpoints are compared by value, the upstream discovery
//!   already deduplicates instances.

mod poller;
mod watcher;

pub use poller::{InstancePoller, InstancePollerHandle, PollerCommand, PollerEvent};
pub use watcher::InstanceWatcher;

use crate::entry::{keys, RegistryEntry};
use crate::error::SyncError;
use crate::service_key::ServiceKey;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Release version reported when an instance does not advertise one.
pub const DEFAULT_INSTANCE_VERSION: &str = "3.0.0";

/// One provider endpoint discovered through its application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceEndpoint {
    application: String,
    entry: RegistryEntry,
}

impl InstanceEndpoint {
    pub fn new(application: impl Into<String>, entry: RegistryEntry) -> Self {
        Self {
            application: application.into(),
            entry,
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn entry(&self) -> &RegistryEntry {
        &self.entry
    }

    pub fn service_key(&self) -> ServiceKey {
        self.entry.service_key()
    }

    pub fn host(&self) -> &str {
        self.entry.host()
    }

    pub fn address(&self) -> String {
        self.entry.address()
    }
}

/// Services of one application.
pub type AppServices = BTreeMap<ServiceKey, Arc<Vec<InstanceEndpoint>>>;

type Mirror = HashMap<String, Arc<AppServices>>;

/// Application-first mirror of provider endpoints.
#[derive(Debug)]
pub struct InstanceSnapshotCache {
    apps: ArcSwap<Mirror>,
}

impl Default for InstanceSnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceSnapshotCache {
    pub fn new() -> Self {
        Self {
            apps: ArcSwap::from_pointee(Mirror::new()),
        }
    }

    /// Replace the endpoint list of `(application, key)`. An empty list removes
    /// the key, and the application once it has no keys left.
    pub fn on_address_changed(
        &self,
        application: &str,
        key: &ServiceKey,
        endpoints: Vec<InstanceEndpoint>,
    ) {
        let endpoints = Arc::new(endpoints);
        self.apps.rcu(|current| {
            let mut next = Mirror::clone(current);
            let mut services = next
                .get(application)
                .map(|s| AppServices::clone(s))
                .unwrap_or_default();
            if endpoints.is_empty() {
                services.remove(key);
            } else {
                services.insert(key.clone(), endpoints.clone());
            }
            if services.is_empty() {
                next.remove(application);
            } else {
                next.insert(application.to_string(), Arc::new(services));
            }
            next
        });
        debug!(
            "Instance address change {} {} -> {} endpoint(s)",
            application,
            key,
            endpoints.len()
        );
    }

    /// Drop every service of `application`.
    pub fn remove_application(&self, application: &str) {
        self.apps.rcu(|current| {
            let mut next = Mirror::clone(current);
            next.remove(application);
            next
        });
    }

    /// Snapshot of one application's services.
    pub fn application(&self, application: &str) -> Option<Arc<AppServices>> {
        self.apps.load().get(application).cloned()
    }

    /// Lock-free snapshot of the whole mirror.
    pub fn snapshot(&self) -> Arc<HashMap<String, Arc<AppServices>>> {
        self.apps.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.load().is_empty()
    }

    /// Service keys with at least one endpoint.
    pub fn services(&self) -> BTreeSet<ServiceKey> {
        self.snapshot()
            .values()
            .flat_map(|services| services.keys().cloned())
            .collect()
    }

    pub fn applications(&self) -> BTreeSet<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Endpoint addresses (`host:port`).
    pub fn addresses(&self) -> BTreeSet<String> {
        self.all().iter().map(InstanceEndpoint::address).collect()
    }

    /// Every endpoint, deduplicated.
    pub fn all(&self) -> Vec<InstanceEndpoint> {
        dedup(
            self.snapshot()
                .values()
                .flat_map(|services| services.values())
                .flat_map(|list| list.iter().cloned()),
        )
    }

    pub fn find_by_service(&self, key: &ServiceKey) -> Vec<InstanceEndpoint> {
        dedup(
            self.snapshot()
                .values()
                .filter_map(|services| services.get(key))
                .flat_map(|list| list.iter().cloned()),
        )
    }

    /// Endpoints whose host, or `host:port`, equals `address`.
    pub fn find_by_address(&self, address: &str) -> Vec<InstanceEndpoint> {
        self.all()
            .into_iter()
            .filter(|e| e.host() == address || e.address() == address)
            .collect()
    }

    pub fn find_by_application(&self, application: &str) -> Vec<InstanceEndpoint> {
        match self.application(application) {
            Some(services) => dedup(services.values().flat_map(|list| list.iter().cloned())),
            None => Vec::new(),
        }
    }

    /// Release version advertised by the application's first endpoint.
    pub fn version_in_application(&self, application: &str) -> Option<String> {
        let services = self.application(application)?;
        services
            .values()
            .find_map(|list| list.first())
            .map(|e| {
                e.entry()
                    .parameter_or(keys::RELEASE, DEFAULT_INSTANCE_VERSION)
                    .to_string()
            })
    }
}

fn dedup(endpoints: impl Iterator<Item = InstanceEndpoint>) -> Vec<InstanceEndpoint> {
    let mut seen = std::collections::HashSet::new();
    endpoints.filter(|e| seen.insert(e.clone())).collect()
}

/// Source of application instances.
pub trait InstanceDiscovery: Send + Sync {
    /// Current provider endpoints of `application`.
    fn instances(&self, application: &str) -> Result<Vec<InstanceEndpoint>, SyncError>;
}

/// In-process discovery backend.
#[derive(Debug, Default)]
pub struct MemoryDiscovery {
    apps: DashMap<String, Vec<InstanceEndpoint>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full instance list of `application`.
    pub fn set_instances(&self, application: &str, endpoints: Vec<InstanceEndpoint>) {
        self.apps.insert(application.to_string(), endpoints);
    }

    pub fn remove(&self, application: &str) {
        self.apps.remove(application);
    }
}

impl InstanceDiscovery for MemoryDiscovery {
    fn instances(&self, application: &str) -> Result<Vec<InstanceEndpoint>, SyncError> {
        Ok(self
            .apps
            .get(application)
            .map(|list| list.value().clone())
            .unwrap_or_default())
    }
}
