// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SyncEngine - wires the caches to their upstream collaborators.
//!
//! # Lifecycle
//!
//! ```text
//! start()    validate config -> init config center -> subscribe reducer
//!            -> (optional) spawn instance poller
//! running    registry notify -> reducer -> cache <- query()
//! shutdown() stop poller -> unsubscribe
//! ```
//!
//! Startup is all-or-nothing: any failure is returned and nothing keeps running.
//! Writes go to the registry only; the cache converges on the next notification.

use crate::cache::RegistrySnapshotCache;
use crate::category::Category;
use crate::config::EngineConfig;
use crate::config_center::ConfigCenter;
use crate::entry::RegistryEntry;
use crate::error::SyncError;
use crate::id::EntryId;
use crate::instance::{InstanceDiscovery, InstancePoller, InstanceSnapshotCache, InstanceWatcher};
use crate::query::QueryEngine;
use crate::reducer::NotificationReducer;
use crate::registry::{RegistryClient, SubscribeQuery};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

struct InstanceSync {
    watcher: Arc<InstanceWatcher>,
    poller: InstancePoller,
}

/// Running sync engine.
pub struct SyncEngine {
    config: EngineConfig,
    registry: Arc<dyn RegistryClient>,
    config_center: Arc<dyn ConfigCenter>,
    reducer: Arc<NotificationReducer>,
    query: QueryEngine,
    subscription: SubscribeQuery,
    instances: Option<InstanceSync>,
    running: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("subscription", &self.subscription.to_string())
            .field("instances", &self.instances.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyncEngine {
    /// Start with interface-based discovery only.
    pub fn start(
        config: EngineConfig,
        registry: Arc<dyn RegistryClient>,
        config_center: Arc<dyn ConfigCenter>,
    ) -> Result<Self, SyncError> {
        Self::start_inner(config, registry, config_center, None)
    }

    /// Start with an instance discovery backend. The backend is only used when
    /// `config.instance_discovery.enabled` is set.
    pub fn start_with_instances(
        config: EngineConfig,
        registry: Arc<dyn RegistryClient>,
        config_center: Arc<dyn ConfigCenter>,
        discovery: Arc<dyn InstanceDiscovery>,
    ) -> Result<Self, SyncError> {
        Self::start_inner(config, registry, config_center, Some(discovery))
    }

    fn start_inner(
        config: EngineConfig,
        registry: Arc<dyn RegistryClient>,
        config_center: Arc<dyn ConfigCenter>,
        discovery: Option<Arc<dyn InstanceDiscovery>>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let discovery = match (config.instance_discovery.enabled, discovery) {
            (true, Some(d)) => Some(d),
            (true, None) => {
                return Err(SyncError::RegistryUnavailable(
                    "instance discovery enabled without a discovery backend".into(),
                ))
            }
            (false, _) => None,
        };

        config_center.init().map_err(|e| {
            error!("Config center initialisation failed: {}", e);
            e
        })?;

        let cache = Arc::new(RegistrySnapshotCache::new());
        let reducer = Arc::new(NotificationReducer::new(cache.clone()));
        let subscription = SubscribeQuery::admin(&config.subscribed_categories());

        registry
            .subscribe(&subscription, reducer.clone())
            .map_err(|e| {
                error!("Registry subscription failed: {}", e);
                e
            })?;

        let (instances, instance_cache) = match discovery {
            Some(discovery) => {
                let instance_cache = Arc::new(InstanceSnapshotCache::new());
                let watcher = Arc::new(InstanceWatcher::new(discovery, instance_cache.clone()));
                match InstancePoller::spawn(
                    watcher.clone(),
                    config.instance_discovery.poll_interval(),
                ) {
                    Ok(poller) => (Some(InstanceSync { watcher, poller }), Some(instance_cache)),
                    Err(e) => {
                        error!("Failed to spawn instance poller: {}", e);
                        if let Err(e) = registry.unsubscribe(&subscription) {
                            warn!("Unsubscribe after failed start: {}", e);
                        }
                        return Err(e.into());
                    }
                }
            }
            None => (None, None),
        };

        info!(
            "Sync engine started ({} categories, instance discovery {})",
            config.subscribed_categories().len(),
            if instances.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            query: QueryEngine::new(cache, instance_cache),
            config,
            registry,
            config_center,
            reducer,
            subscription,
            instances,
            running: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    pub fn config_center(&self) -> &Arc<dyn ConfigCenter> {
        &self.config_center
    }

    pub fn reducer(&self) -> &Arc<NotificationReducer> {
        &self.reducer
    }

    pub fn subscription(&self) -> &SubscribeQuery {
        &self.subscription
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), SyncError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SyncError::ShutDown)
        }
    }

    /// Watch applications announced by a service-to-application mapping event.
    /// No-op without instance discovery.
    pub fn watch_applications(&self, applications: Vec<String>) {
        if let Some(sync) = &self.instances {
            if !sync.poller.handle().watch(applications) {
                warn!("Instance poller is not running");
            }
        }
    }

    /// Refresh every watched application now, on the caller's thread.
    pub fn refresh_instances(&self) -> usize {
        self.instances
            .as_ref()
            .map_or(0, |sync| sync.watcher.refresh_all())
    }

    /// Publish a new registration.
    pub fn register(&self, entry: &RegistryEntry) -> Result<(), SyncError> {
        self.ensure_running()?;
        self.registry.register(entry)
    }

    fn resolve(&self, category: Category, id: &EntryId) -> Result<Arc<RegistryEntry>, SyncError> {
        self.query.find_by_id(category, id).ok_or_else(|| {
            warn!("{} entry {} is gone", category, id);
            SyncError::Conflict {
                category,
                id: id.clone(),
            }
        })
    }

    /// Withdraw the entry currently known under `id`. Returns the withdrawn entry.
    pub fn unregister(
        &self,
        category: Category,
        id: &EntryId,
    ) -> Result<Arc<RegistryEntry>, SyncError> {
        self.ensure_running()?;
        let entry = self.resolve(category, id)?;
        self.registry.unregister(&entry)?;
        Ok(entry)
    }

    /// Replace the entry known under `id` with `replacement`.
    pub fn update(
        &self,
        category: Category,
        id: &EntryId,
        replacement: &RegistryEntry,
    ) -> Result<(), SyncError> {
        self.ensure_running()?;
        let old = self.resolve(category, id)?;
        self.registry.unregister(&old)?;
        self.registry.register(replacement)
    }

    /// Stop the poller and unsubscribe. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(sync) = &self.instances {
            sync.poller.shutdown();
        }
        if let Err(e) = self.registry.unsubscribe(&self.subscription) {
            warn!("Unsubscribe failed: {}", e);
        }
        info!("Sync engine stopped");
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigCenterConfig, InstanceDiscoveryConfig};
    use crate::config_center::{ConfigCenterError, MemoryConfigCenter};
    use crate::registry::MemoryRegistry;

    const P1: &str = "dubbo://10.0.0.1:20880/svc?application=app&version=1";

    struct BrokenCenter;

    impl ConfigCenter for BrokenCenter {
        fn init(&self) -> Result<(), ConfigCenterError> {
            Err(ConfigCenterError::Unavailable("down".into()))
        }
        fn get_config(&self, _: &str, _: &str) -> Result<Option<String>, ConfigCenterError> {
            Ok(None)
        }
        fn set_config(&self, _: &str, _: &str, _: &str) -> Result<(), ConfigCenterError> {
            Ok(())
        }
        fn delete_config(&self, _: &str, _: &str) -> Result<bool, ConfigCenterError> {
            Ok(false)
        }
    }

    fn start(registry: &Arc<MemoryRegistry>) -> SyncEngine {
        SyncEngine::start(
            EngineConfig::default(),
            registry.clone(),
            Arc::new(MemoryConfigCenter::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_start_populates_cache() {
        let registry = Arc::new(MemoryRegistry::seeded(&[P1]));
        let engine = start(&registry);
        assert_eq!(engine.query().find_all(Category::Providers).len(), 1);
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[test]
    fn test_start_fails_on_unavailable_registry() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.set_available(false);
        let result = SyncEngine::start(
            EngineConfig::default(),
            registry,
            Arc::new(MemoryConfigCenter::new()),
        );
        assert!(matches!(result, Err(SyncError::RegistryUnavailable(_))));
    }

    #[test]
    fn test_start_fails_on_config_center() {
        let registry = Arc::new(MemoryRegistry::new());
        let result = SyncEngine::start(EngineConfig::default(), registry.clone(), Arc::new(BrokenCenter));
        assert!(matches!(result, Err(SyncError::ConfigCenter(_))));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let config = EngineConfig {
            config_center: ConfigCenterConfig::File { root: None },
            ..Default::default()
        };
        let result = SyncEngine::start(
            config,
            Arc::new(MemoryRegistry::new()),
            Arc::new(MemoryConfigCenter::new()),
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_instance_discovery_requires_backend() {
        let config = EngineConfig {
            instance_discovery: InstanceDiscoveryConfig {
                enabled: true,
                poll_interval_secs: 1,
            },
            ..Default::default()
        };
        let result = SyncEngine::start(
            config,
            Arc::new(MemoryRegistry::new()),
            Arc::new(MemoryConfigCenter::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unregister_round_trip_and_conflict() {
        let registry = Arc::new(MemoryRegistry::seeded(&[P1]));
        let engine = start(&registry);
        let (id, _) = engine
            .query()
            .find_all(Category::Providers)
            .into_iter()
            .next()
            .unwrap();

        let removed = engine.unregister(Category::Providers, &id).unwrap();
        assert_eq!(removed.host(), "10.0.0.1");
        assert!(engine.query().find_all(Category::Providers).is_empty());

        let err = engine.unregister(Category::Providers, &id).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_update_replaces_entry() {
        let registry = Arc::new(MemoryRegistry::seeded(&[P1]));
        let engine = start(&registry);
        let (id, old) = engine
            .query()
            .find_all(Category::Providers)
            .into_iter()
            .next()
            .unwrap();

        let replacement = (*old).clone().with_parameter("weight", "50");
        engine.update(Category::Providers, &id, &replacement).unwrap();

        let now = engine.query().find_all(Category::Providers);
        assert_eq!(now.len(), 1);
        assert!(!now.contains_key(&id));
        assert_eq!(now.values().next().unwrap().parameter("weight"), Some("50"));
    }

    #[test]
    fn test_shutdown_is_idempotent_and_blocks_writes() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = start(&registry);
        engine.shutdown();
        engine.shutdown();

        assert!(!engine.is_running());
        assert_eq!(registry.subscriber_count(), 0);
        assert!(matches!(
            engine.register(&RegistryEntry::parse(P1).unwrap()),
            Err(SyncError::ShutDown)
        ));
    }
}
