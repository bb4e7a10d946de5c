// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QueryEngine - read side over the snapshot caches.
//!
//! Every read works on snapshots (`Arc` clones of per-key maps), so queries run
//! concurrently with notifications without blocking them.
//!
//! Filter keys:
//! - `category` (required)
//! - `.service` : exact service key
//! - `.address` : exact `host:port`
//! - `.id`      : entry id
//! - anything else: exact parameter value

mod search;

pub use search::{fuzzy_match, is_fuzzy, SearchKind, UnknownSearchKind};

use crate::cache::RegistrySnapshotCache;
use crate::category::Category;
use crate::entry::{keys, RegistryEntry};
use crate::error::SyncError;
use crate::id::EntryId;
use crate::index::EntryMap;
use crate::instance::InstanceSnapshotCache;
use crate::service_key::ServiceKey;
use crate::views::{ConsumerView, OverrideView, ProviderView, RouteView};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const SERVICE_FILTER_KEY: &str = ".service";
pub const ADDRESS_FILTER_KEY: &str = ".address";
pub const ID_FILTER_KEY: &str = ".id";

/// Version reported for applications that do not advertise one.
pub const DEFAULT_SERVICE_VERSION: &str = "2.6";

/// Conjunctive filter over one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub category: Category,
    pub service: Option<ServiceKey>,
    pub address: Option<String>,
    pub id: Option<EntryId>,
    pub parameters: BTreeMap<String, String>,
}

impl QueryFilter {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            service: None,
            address: None,
            id: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn service(mut self, key: ServiceKey) -> Self {
        self.service = Some(key);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Build from a raw key/value map (the console's filter form).
    pub fn from_map<K, V>(map: &BTreeMap<K, V>) -> Result<Self, SyncError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut category = None;
        let mut filter = Self::new(Category::Providers);
        for (key, value) in map {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                keys::CATEGORY => {
                    category = Some(
                        value
                            .parse::<Category>()
                            .map_err(|e| SyncError::Query(e.to_string()))?,
                    );
                }
                SERVICE_FILTER_KEY => {
                    filter.service = Some(
                        value
                            .parse::<ServiceKey>()
                            .map_err(|e| SyncError::Query(e.to_string()))?,
                    );
                }
                ADDRESS_FILTER_KEY => filter.address = Some(value.to_string()),
                ID_FILTER_KEY => filter.id = Some(EntryId::from(value)),
                _ => {
                    filter.parameters.insert(key.to_string(), value.to_string());
                }
            }
        }
        filter.category = category.ok_or_else(|| SyncError::Query("no category".into()))?;
        Ok(filter)
    }

    fn matches(&self, id: &EntryId, entry: &RegistryEntry) -> bool {
        if self.id.as_ref().is_some_and(|wanted| wanted != id) {
            return false;
        }
        if self
            .address
            .as_deref()
            .is_some_and(|wanted| wanted != entry.address())
        {
            return false;
        }
        self.parameters
            .iter()
            .all(|(k, v)| entry.parameter(k) == Some(v.as_str()))
    }
}

/// Read API over the interface-based cache and, when present, the instance-based
/// mirror.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    cache: Arc<RegistrySnapshotCache>,
    instances: Option<Arc<InstanceSnapshotCache>>,
}

impl QueryEngine {
    pub fn new(
        cache: Arc<RegistrySnapshotCache>,
        instances: Option<Arc<InstanceSnapshotCache>>,
    ) -> Self {
        Self { cache, instances }
    }

    pub fn cache(&self) -> &Arc<RegistrySnapshotCache> {
        &self.cache
    }

    pub fn instances(&self) -> Option<&Arc<InstanceSnapshotCache>> {
        self.instances.as_ref()
    }

    /// Entries of `filter.category` matching every constraint. Never fails; an
    /// empty map means no match.
    pub fn filter(&self, filter: &QueryFilter) -> EntryMap {
        let index = self.cache.get(filter.category);
        let candidates: Vec<Arc<EntryMap>> = match &filter.service {
            Some(key) => index.get(key).into_iter().collect(),
            None => index.snapshot().into_iter().map(|(_, m)| m).collect(),
        };

        let mut out = EntryMap::new();
        for members in candidates {
            for (id, entry) in members.iter() {
                if filter.matches(id, entry) {
                    out.insert(id.clone(), entry.clone());
                }
            }
        }
        out
    }

    pub fn find_all(&self, category: Category) -> EntryMap {
        self.cache.get(category).entries()
    }

    pub fn find_by_service(&self, category: Category, key: &ServiceKey) -> EntryMap {
        self.filter(&QueryFilter::new(category).service(key.clone()))
    }

    /// Entries whose `host:port` equals `address`.
    pub fn find_by_address(&self, category: Category, address: &str) -> EntryMap {
        self.filter(&QueryFilter::new(category).address(address))
    }

    pub fn find_by_application(&self, category: Category, application: &str) -> EntryMap {
        self.filter(&QueryFilter::new(category).parameter(keys::APPLICATION, application))
    }

    pub fn find_by_id(&self, category: Category, id: &EntryId) -> Option<Arc<RegistryEntry>> {
        self.cache.find_by_id(category, id).map(|(_, entry)| entry)
    }

    /// Provider service keys, merged across both discovery paths.
    pub fn services(&self) -> BTreeSet<String> {
        let mut services: BTreeSet<String> = self
            .cache
            .get(Category::Providers)
            .keys()
            .iter()
            .map(ServiceKey::to_string)
            .collect();
        if let Some(instances) = &self.instances {
            services.extend(instances.services().iter().map(ServiceKey::to_string));
        }
        services
    }

    /// Provider addresses, merged across both discovery paths.
    pub fn addresses(&self) -> BTreeSet<String> {
        let mut addresses: BTreeSet<String> = self
            .find_all(Category::Providers)
            .values()
            .map(|e| e.address())
            .collect();
        if let Some(instances) = &self.instances {
            addresses.extend(instances.addresses());
        }
        addresses
    }

    /// Provider applications, merged across both discovery paths.
    pub fn applications(&self) -> BTreeSet<String> {
        let mut applications: BTreeSet<String> = self
            .find_all(Category::Providers)
            .values()
            .filter_map(|e| e.application().map(str::to_string))
            .collect();
        if let Some(instances) = &self.instances {
            applications.extend(instances.applications());
        }
        applications
    }

    /// Service keys provided by `application` (interface-based registrations).
    pub fn services_by_application(&self, application: &str) -> BTreeSet<String> {
        self.find_by_application(Category::Providers, application)
            .values()
            .map(|e| e.service_key().to_string())
            .collect()
    }

    /// Release version of `application`, `2.6` when no provider says.
    pub fn service_version(&self, application: &str) -> String {
        if let Some(version) = self.version_in_application(application) {
            return version;
        }
        self.find_by_application(Category::Providers, application)
            .values()
            .find_map(|e| e.parameter(keys::RELEASE).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string())
    }

    /// Release version advertised by the application's instances.
    pub fn version_in_application(&self, application: &str) -> Option<String> {
        self.instances
            .as_ref()
            .and_then(|i| i.version_in_application(application))
    }

    /// Providers of `key` from both discovery paths.
    pub fn providers_by_service(&self, key: &ServiceKey) -> Vec<ProviderView> {
        let mut views = provider_views(&self.find_by_service(Category::Providers, key));
        if let Some(instances) = &self.instances {
            views.extend(instances.find_by_service(key).iter().map(ProviderView::from_endpoint));
        }
        views
    }

    /// Providers at `address` from both discovery paths. Instance-based providers
    /// also match on host alone.
    pub fn providers_by_address(&self, address: &str) -> Vec<ProviderView> {
        let mut views = provider_views(&self.find_by_address(Category::Providers, address));
        if let Some(instances) = &self.instances {
            views.extend(instances.find_by_address(address).iter().map(ProviderView::from_endpoint));
        }
        views
    }

    /// Providers of `application` from both discovery paths.
    pub fn providers_by_application(&self, application: &str) -> Vec<ProviderView> {
        let mut views = provider_views(&self.find_by_application(Category::Providers, application));
        if let Some(instances) = &self.instances {
            views.extend(
                instances
                    .find_by_application(application)
                    .iter()
                    .map(ProviderView::from_endpoint),
            );
        }
        views
    }

    pub fn all_providers(&self) -> Vec<ProviderView> {
        let mut views = provider_views(&self.find_all(Category::Providers));
        if let Some(instances) = &self.instances {
            views.extend(instances.all().iter().map(ProviderView::from_endpoint));
        }
        views
    }

    pub fn consumers_by_service(&self, key: &ServiceKey) -> Vec<ConsumerView> {
        sorted(
            self.find_by_service(Category::Consumers, key)
                .iter()
                .map(|(id, e)| ConsumerView::from_entry(id, e))
                .collect(),
            |v: &ConsumerView| v.id.clone(),
        )
    }

    pub fn consumers_by_application(&self, application: &str) -> Vec<ConsumerView> {
        sorted(
            self.find_by_application(Category::Consumers, application)
                .iter()
                .map(|(id, e)| ConsumerView::from_entry(id, e))
                .collect(),
            |v: &ConsumerView| v.id.clone(),
        )
    }

    pub fn routes_by_service(&self, key: &ServiceKey) -> Vec<RouteView> {
        sorted(
            self.find_by_service(Category::Routers, key)
                .iter()
                .map(|(id, e)| RouteView::from_entry(id, e))
                .collect(),
            |v: &RouteView| v.id.clone(),
        )
    }

    pub fn overrides_by_service(&self, key: &ServiceKey) -> Vec<OverrideView> {
        sorted(
            self.find_by_service(Category::Configurators, key)
                .iter()
                .map(|(id, e)| OverrideView::from_entry(id, e))
                .collect(),
            |v: &OverrideView| v.id.clone(),
        )
    }
}

fn provider_views(entries: &EntryMap) -> Vec<ProviderView> {
    sorted(
        entries
            .iter()
            .map(|(id, e)| ProviderView::from_entry(id, e))
            .collect(),
        |v: &ProviderView| v.id.clone(),
    )
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceEndpoint;
    use crate::reducer::NotificationReducer;
    use crate::views::RegistrySource;

    fn engine_with(urls: &[&str]) -> QueryEngine {
        let cache = Arc::new(RegistrySnapshotCache::new());
        NotificationReducer::new(cache.clone()).notify_urls(urls);
        QueryEngine::new(cache, None)
    }

    const P1: &str = "dubbo://10.0.0.1:20880/com.foo.Bar?application=app1&version=1.0&side=provider";
    const P2: &str = "dubbo://10.0.0.2:20880/com.foo.Bar?application=app2&version=1.0";
    const P3: &str = "dubbo://10.0.0.1:20881/com.baz.Qux?application=app1&release=2.7.8";
    const C1: &str = "consumer://10.0.0.9/com.foo.Bar?category=consumers&application=web&version=1.0";

    #[test]
    fn test_filter_from_map_requires_category() {
        let mut map = BTreeMap::new();
        map.insert(".service", "com.foo.Bar:1.0");
        assert!(matches!(QueryFilter::from_map(&map), Err(SyncError::Query(_))));

        map.insert("category", "providers");
        map.insert(".address", "10.0.0.1:20880");
        map.insert("side", "provider");
        let filter = QueryFilter::from_map(&map).unwrap();
        assert_eq!(filter.category, Category::Providers);
        assert_eq!(filter.service, Some(ServiceKey::new("com.foo.Bar", None, Some("1.0"))));
        assert_eq!(filter.address.as_deref(), Some("10.0.0.1:20880"));
        assert_eq!(filter.parameters.get("side").map(String::as_str), Some("provider"));

        map.insert("category", "bogus");
        assert!(QueryFilter::from_map(&map).is_err());
    }

    #[test]
    fn test_filter_intersection() {
        let engine = engine_with(&[P1, P2, P3, C1]);
        let key = ServiceKey::new("com.foo.Bar", None, Some("1.0"));

        let all = engine.filter(&QueryFilter::new(Category::Providers).service(key.clone()));
        assert_eq!(all.len(), 2);

        let narrowed = engine.filter(
            &QueryFilter::new(Category::Providers)
                .service(key)
                .address("10.0.0.1:20880")
                .parameter("side", "provider"),
        );
        assert_eq!(narrowed.len(), 1);

        let none = engine.filter(&QueryFilter::new(Category::Providers).parameter("side", "consumer"));
        assert!(none.is_empty());
    }

    #[test]
    fn test_find_by_service_and_address() {
        let engine = engine_with(&[P1, P2, P3, C1]);
        let key = ServiceKey::new("com.foo.Bar", None, Some("1.0"));

        assert_eq!(engine.find_by_service(Category::Providers, &key).len(), 2);
        assert_eq!(engine.find_by_service(Category::Consumers, &key).len(), 1);
        assert_eq!(engine.find_by_address(Category::Providers, "10.0.0.1:20880").len(), 1);
        assert!(engine.find_by_address(Category::Providers, "10.0.0.1").is_empty());
        assert_eq!(engine.find_by_application(Category::Providers, "app1").len(), 2);
        assert_eq!(engine.find_all(Category::Providers).len(), 3);
    }

    #[test]
    fn test_find_by_id() {
        let engine = engine_with(&[P1]);
        let (id, _) = engine.find_all(Category::Providers).into_iter().next().unwrap();
        assert!(engine.find_by_id(Category::Providers, &id).is_some());
        assert!(engine.find_by_id(Category::Consumers, &id).is_none());
    }

    #[test]
    fn test_catalogs_and_versions() {
        let engine = engine_with(&[P1, P2, P3]);
        assert_eq!(
            engine.services().into_iter().collect::<Vec<_>>(),
            vec!["com.baz.Qux", "com.foo.Bar:1.0"]
        );
        assert_eq!(engine.applications().len(), 2);
        assert!(engine.addresses().contains("10.0.0.1:20881"));
        assert_eq!(engine.services_by_application("app1").len(), 2);
        assert_eq!(engine.service_version("app1"), "2.7.8");
        assert_eq!(engine.service_version("app2"), DEFAULT_SERVICE_VERSION);
        assert_eq!(engine.version_in_application("app1"), None);
    }

    #[test]
    fn test_merged_providers() {
        let cache = Arc::new(RegistrySnapshotCache::new());
        NotificationReducer::new(cache.clone()).notify_urls(&[P1]);
        let instances = Arc::new(InstanceSnapshotCache::new());
        let key = ServiceKey::new("com.foo.Bar", None, Some("1.0"));
        instances.on_address_changed(
            "app3",
            &key,
            vec![InstanceEndpoint::new(
                "app3",
                RegistryEntry::parse("tri://10.0.0.5:50051/com.foo.Bar?version=1.0&release=3.1.0").unwrap(),
            )],
        );
        let engine = QueryEngine::new(cache, Some(instances));

        let providers = engine.providers_by_service(&key);
        assert_eq!(providers.len(), 2);
        assert!(providers.iter().any(|p| p.source == RegistrySource::Instance));
        assert_eq!(engine.providers_by_address("10.0.0.5").len(), 1);
        assert_eq!(engine.providers_by_application("app3").len(), 1);
        assert_eq!(engine.all_providers().len(), 2);
        assert!(engine.applications().contains("app3"));
        assert_eq!(engine.service_version("app3"), "3.1.0");
    }

    #[test]
    fn test_typed_views_per_category() {
        let engine = engine_with(&[
            C1,
            "route://0.0.0.0/com.foo.Bar?category=routers&version=1.0&name=r",
            "override://0.0.0.0/com.foo.Bar?category=configurators&version=1.0&anyhost=true&timeout=1",
        ]);
        let key = ServiceKey::new("com.foo.Bar", None, Some("1.0"));
        assert_eq!(engine.consumers_by_service(&key).len(), 1);
        assert_eq!(engine.consumers_by_application("web").len(), 1);
        assert_eq!(engine.routes_by_service(&key)[0].name.as_deref(), Some("r"));
        assert_eq!(engine.overrides_by_service(&key)[0].address, None);
    }
}
