// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry Snapshot Sync
//!
//! Mirrors the live state of a push-based service registry (providers,
//! consumers, routing rules, configuration overrides) into in-memory indexes
//! and serves concurrent queries over them.
//!
//! # Features
//!
//! - **Full-snapshot sync**: each notification replaces the complete membership
//!   of every service key it mentions, including withdrawals and wildcard
//!   withdrawals
//! - **Stable ids**: an unchanged registration keeps its id across notifications
//! - **Lock-free reads**: queries see whole per-key snapshots, never a torn update
//! - **Two discovery paths**: interface-based registrations and
//!   application-first instances, merged at query time
//! - **Fuzzy search**: glob patterns over services, applications and addresses
//!
//! # Quick Start
//!
//! ```
//! use registry_sync::{
//!     Category, EngineConfig, MemoryConfigCenter, MemoryRegistry, ServiceKey, SyncEngine,
//! };
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MemoryRegistry::seeded(&[
//!     "dubbo://10.0.0.1:20880/com.foo.Bar?application=shop&version=1.0",
//! ]));
//! let engine = SyncEngine::start(
//!     EngineConfig::default(),
//!     registry,
//!     Arc::new(MemoryConfigCenter::new()),
//! )
//! .unwrap();
//!
//! let key = ServiceKey::new("com.foo.Bar", None, Some("1.0"));
//! assert_eq!(engine.query().find_by_service(Category::Providers, &key).len(), 1);
//! engine.shutdown();
//! ```
//!
//! # Configuration File
//!
//! ```json
//! {
//!   "categories": ["providers", "consumers", "routers", "configurators"],
//!   "config_center": { "type": "file", "root": "/var/lib/registry-sync" },
//!   "instance_discovery": { "enabled": false, "poll_interval_secs": 5 },
//!   "seed_snapshot": "snapshot.txt",
//!   "log_level": "info"
//! }
//! ```

pub mod cache;
pub mod category;
pub mod config;
pub mod config_center;
pub mod engine;
pub mod entry;
pub mod error;
pub mod id;
pub mod index;
pub mod instance;
pub mod notification;
pub mod query;
pub mod reducer;
pub mod registry;
pub mod service_key;
pub mod views;

pub use cache::RegistrySnapshotCache;
pub use category::Category;
pub use config::{ConfigCenterConfig, ConfigError, EngineConfig, InstanceDiscoveryConfig};
pub use config_center::{ConfigCenter, ConfigCenterError, FileConfigCenter, MemoryConfigCenter};
pub use engine::SyncEngine;
pub use entry::{EntryParseError, RegistryEntry};
pub use error::SyncError;
pub use id::{EntryId, StableIdAssigner};
pub use index::{CategoryIndex, EntryMap};
pub use instance::{
    InstanceDiscovery, InstanceEndpoint, InstancePoller, InstanceSnapshotCache, InstanceWatcher,
    MemoryDiscovery,
};
pub use notification::NotificationEntry;
pub use query::{fuzzy_match, QueryEngine, QueryFilter, SearchKind};
pub use reducer::{NotificationReducer, NotifySummary};
pub use registry::{MemoryRegistry, NotifyListener, RegistryClient, SubscribeQuery};
pub use service_key::{ServiceKey, ServiceKeyPattern};
pub use views::{ConsumerView, OverrideView, ProviderView, RegistrySource, RouteView, ServiceSummary};
