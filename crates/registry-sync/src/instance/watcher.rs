// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-application instance watcher.
//!
//! Applications are watched once, on first sight in a mapping event. Each
//! refresh regroups the application's instances by service key and emits one
//! address change per key, including an empty change for every key that
//! vanished since the previous refresh.

use super::{InstanceDiscovery, InstanceEndpoint, InstanceSnapshotCache};
use crate::error::SyncError;
use crate::service_key::ServiceKey;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

pub struct InstanceWatcher {
    discovery: Arc<dyn InstanceDiscovery>,
    cache: Arc<InstanceSnapshotCache>,
    // application -> keys published by the last refresh
    watched: Mutex<BTreeMap<String, BTreeSet<ServiceKey>>>,
}

impl std::fmt::Debug for InstanceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceWatcher")
            .field("watched", &self.watched.lock().len())
            .finish()
    }
}

impl InstanceWatcher {
    pub fn new(discovery: Arc<dyn InstanceDiscovery>, cache: Arc<InstanceSnapshotCache>) -> Self {
        Self {
            discovery,
            cache,
            watched: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<InstanceSnapshotCache> {
        &self.cache
    }

    /// Start watching `applications`. Already-watched names are ignored; new ones
    /// are refreshed immediately. Returns the newly watched names.
    pub fn watch<I, S>(&self, applications: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<String> = {
            let mut watched = self.watched.lock();
            applications
                .into_iter()
                .map(Into::into)
                .filter(|app: &String| !app.is_empty())
                .filter(|app| {
                    if watched.contains_key(app) {
                        false
                    } else {
                        watched.insert(app.clone(), BTreeSet::new());
                        true
                    }
                })
                .collect()
        };
        for app in &added {
            info!("Watching application {}", app);
            if let Err(e) = self.refresh(app) {
                warn!("Initial refresh of {} failed: {}", app, e);
            }
        }
        added
    }

    /// Watched application names.
    pub fn watched(&self) -> Vec<String> {
        self.watched.lock().keys().cloned().collect()
    }

    /// Re-read `application` and publish its address changes.
    pub fn refresh(&self, application: &str) -> Result<(), SyncError> {
        let instances = self.discovery.instances(application)?;

        let mut grouped: BTreeMap<ServiceKey, Vec<InstanceEndpoint>> = BTreeMap::new();
        for endpoint in instances {
            grouped.entry(endpoint.service_key()).or_default().push(endpoint);
        }

        let current: BTreeSet<ServiceKey> = grouped.keys().cloned().collect();
        let previous = {
            let mut watched = self.watched.lock();
            watched
                .insert(application.to_string(), current)
                .unwrap_or_default()
        };

        for vanished in previous.iter().filter(|k| !grouped.contains_key(*k)) {
            self.cache.on_address_changed(application, vanished, Vec::new());
        }
        for (key, endpoints) in grouped {
            self.cache.on_address_changed(application, &key, endpoints);
        }
        Ok(())
    }

    /// Refresh every watched application. Failures are logged per application and
    /// do not stop the others. Returns the number of successful refreshes.
    pub fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for app in self.watched() {
            match self.refresh(&app) {
                Ok(()) => refreshed += 1,
                Err(e) => warn!("Refresh of {} failed: {}", app, e),
            }
        }
        refreshed
    }
}
