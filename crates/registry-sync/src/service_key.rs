// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service keys and withdrawal patterns.
//!
//! A [`ServiceKey`] buckets registry records inside a category. Its text form is
//! `interface[:version][/group]`. Many endpoints share one key.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wildcard token used by registries for "any group/version/interface".
pub const ANY_VALUE: &str = "*";

/// Composite identity `interface[:version][/group]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    interface: String,
    version: Option<String>,
    group: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl ServiceKey {
    /// Build a key. Empty group/version are treated as absent.
    pub fn new(interface: impl Into<String>, group: Option<&str>, version: Option<&str>) -> Self {
        Self {
            interface: interface.into(),
            version: non_empty(version),
            group: non_empty(group),
        }
    }

    /// Key for an interface without group or version.
    pub fn interface_only(interface: impl Into<String>) -> Self {
        Self::new(interface, None, None)
    }

    /// Interface (service) name.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Group, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.interface)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        if let Some(group) = &self.group {
            write!(f, "/{}", group)?;
        }
        Ok(())
    }
}

/// Error returned for an unparseable service key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid service key: {0:?}")]
pub struct InvalidServiceKey(pub String);

impl FromStr for ServiceKey {
    type Err = InvalidServiceKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, group) = match s.split_once('/') {
            Some((rest, group)) => (rest, Some(group)),
            None => (s, None),
        };
        let (interface, version) = match rest.split_once(':') {
            Some((interface, version)) => (interface, Some(version)),
            None => (rest, None),
        };
        if interface.is_empty() {
            return Err(InvalidServiceKey(s.to_string()));
        }
        Ok(Self::new(interface, group, version))
    }
}

impl Serialize for ServiceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Match rule for one component (group or version) of a withdrawal pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    /// Wildcard: matches any value, including absent.
    Any,
    /// Exact value; `None` matches only keys without the component.
    Exact(Option<String>),
}

impl Component {
    /// Interpret a raw parameter value, recognising the wildcard token.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(ANY_VALUE) => Self::Any,
            other => Self::Exact(non_empty(other)),
        }
    }

    fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected.as_deref() == value,
        }
    }

    fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Target of a withdrawal: one interface, with group and version either pinned or
/// wildcarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceKeyPattern {
    pub interface: String,
    pub group: Component,
    pub version: Component,
}

impl ServiceKeyPattern {
    /// Pattern matching exactly one key.
    pub fn exact(key: &ServiceKey) -> Self {
        Self {
            interface: key.interface.clone(),
            group: Component::Exact(key.group.clone()),
            version: Component::Exact(key.version.clone()),
        }
    }

    /// True if group or version is wildcarded.
    pub fn is_wildcard(&self) -> bool {
        self.group.is_any() || self.version.is_any()
    }

    /// The single key this pattern designates when it has no wildcard.
    pub fn as_exact_key(&self) -> Option<ServiceKey> {
        match (&self.group, &self.version) {
            (Component::Exact(group), Component::Exact(version)) => Some(ServiceKey::new(
                self.interface.clone(),
                group.as_deref(),
                version.as_deref(),
            )),
            _ => None,
        }
    }

    /// Check whether `key` falls under this pattern.
    pub fn matches(&self, key: &ServiceKey) -> bool {
        key.interface == self.interface
            && self.group.matches(key.group())
            && self.version.matches(key.version())
    }
}
