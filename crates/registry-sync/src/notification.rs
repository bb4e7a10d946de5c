// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Classified registry notifications.
//!
//! Registries signal withdrawal in-band with an `empty://` record whose group
//! and/or version may be the `*` wildcard. That sentinel is recognised here,
//! once, and turned into an explicit [`NotificationEntry::Withdraw`].

use crate::category::Category;
use crate::entry::{keys, RegistryEntry};
use crate::service_key::{Component, ServiceKey, ServiceKeyPattern};

/// One notified record, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEntry {
    /// A live record: part of the complete membership of `key` in `category`.
    Upsert {
        category: Category,
        key: ServiceKey,
        entry: RegistryEntry,
    },
    /// Every key matched by `pattern` in `category` is gone.
    Withdraw {
        category: Category,
        pattern: ServiceKeyPattern,
    },
}

impl NotificationEntry {
    /// Classify a parsed record.
    pub fn classify(entry: RegistryEntry) -> Self {
        let category = entry.category();
        if entry.is_empty_protocol() {
            let pattern = ServiceKeyPattern {
                interface: entry.service_interface().to_string(),
                group: Component::from_param(entry.parameter(keys::GROUP)),
                version: Component::from_param(entry.parameter(keys::VERSION)),
            };
            Self::Withdraw { category, pattern }
        } else {
            Self::Upsert {
                category,
                key: entry.service_key(),
                entry,
            }
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Upsert { category, .. } | Self::Withdraw { category, .. } => *category,
        }
    }

    pub fn is_withdraw(&self) -> bool {
        matches!(self, Self::Withdraw { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_upsert_defaults_to_providers() {
        let entry = RegistryEntry::parse("dubbo://10.0.0.1:20880/svc?version=1.0").unwrap();
        match NotificationEntry::classify(entry) {
            NotificationEntry::Upsert { category, key, .. } => {
                assert_eq!(category, Category::Providers);
                assert_eq!(key.to_string(), "svc:1.0");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_exact_withdraw() {
        let entry = RegistryEntry::parse(
            "empty://0.0.0.0/svc?category=consumers&group=g&version=1.0",
        )
        .unwrap();
        let classified = NotificationEntry::classify(entry);
        assert!(classified.is_withdraw());
        assert_eq!(classified.category(), Category::Consumers);
        match classified {
            NotificationEntry::Withdraw { pattern, .. } => {
                assert!(!pattern.is_wildcard());
                assert_eq!(
                    pattern.as_exact_key(),
                    Some(ServiceKey::new("svc", Some("g"), Some("1.0")))
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_wildcard_withdraw() {
        let entry =
            RegistryEntry::parse("empty://0.0.0.0/svc?category=routers&group=*&version=*")
                .unwrap();
        match NotificationEntry::classify(entry) {
            NotificationEntry::Withdraw { category, pattern } => {
                assert_eq!(category, Category::Routers);
                assert!(pattern.is_wildcard());
                assert_eq!(pattern.interface, "svc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
