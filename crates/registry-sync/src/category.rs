// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry categories.
//!
//! Every registry record belongs to exactly one category. Each category has its
//! own index and lifecycle; records never move between categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Service providers (the default when a record carries no category).
    Providers,
    /// Service consumers.
    Consumers,
    /// Routing rules.
    Routers,
    /// Dynamic configuration overrides.
    Configurators,
}

impl Category {
    /// All categories, in index order.
    pub const ALL: [Category; 4] = [
        Category::Providers,
        Category::Consumers,
        Category::Routers,
        Category::Configurators,
    ];

    /// Wire name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Providers => "providers",
            Self::Consumers => "consumers",
            Self::Routers => "routers",
            Self::Configurators => "configurators",
        }
    }

    /// Slot of this category in per-category arrays.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Providers => 0,
            Self::Consumers => 1,
            Self::Routers => 2,
            Self::Configurators => 3,
        }
    }

    /// Resolve the `category` parameter of a notified record.
    ///
    /// Missing or unrecognised values fall back to [`Category::Providers`].
    pub fn from_param(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::Providers)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name strictly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "providers" => Ok(Self::Providers),
            "consumers" => Ok(Self::Consumers),
            "routers" => Ok(Self::Routers),
            "configurators" => Ok(Self::Configurators),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_from_param_defaults_to_providers() {
        assert_eq!(Category::from_param(None), Category::Providers);
        assert_eq!(Category::from_param(Some("bogus")), Category::Providers);
        assert_eq!(Category::from_param(Some("routers")), Category::Routers);
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        assert!("overrides".parse::<Category>().is_err());
    }

    #[test]
    fn test_indices_are_distinct() {
        let mut seen = [false; 4];
        for category in Category::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
    }
}
