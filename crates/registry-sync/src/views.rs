// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed read models handed to the console layer.

use crate::entry::{keys, RegistryEntry, DEFAULT_WEIGHT};
use crate::id::EntryId;
use crate::instance::InstanceEndpoint;
use crate::service_key::ServiceKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// Discovery path a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistrySource {
    /// Interface-based registration (one record per service).
    Interface,
    /// Instance-based registration (one record per application instance).
    Instance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderView {
    /// Absent for instance-based providers, which carry no stable id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub service: ServiceKey,
    pub address: String,
    pub application: Option<String>,
    pub url: String,
    pub parameters: String,
    pub dynamic: bool,
    pub enabled: bool,
    pub weight: i64,
    pub username: Option<String>,
    pub source: RegistrySource,
}

impl ProviderView {
    pub fn from_entry(id: &EntryId, entry: &RegistryEntry) -> Self {
        Self {
            id: Some(id.clone()),
            service: entry.service_key(),
            address: entry.address(),
            application: entry.application().map(str::to_string),
            url: entry.identity_string(),
            parameters: entry.parameter_string(),
            dynamic: entry.bool_parameter(keys::DYNAMIC, true),
            enabled: entry.bool_parameter(keys::ENABLED, true),
            weight: entry.int_parameter(keys::WEIGHT, DEFAULT_WEIGHT),
            username: entry.parameter(keys::OWNER).map(str::to_string),
            source: RegistrySource::Interface,
        }
    }

    pub fn from_endpoint(endpoint: &InstanceEndpoint) -> Self {
        let entry = endpoint.entry();
        Self {
            id: None,
            service: entry.service_key(),
            address: entry.address(),
            application: Some(endpoint.application().to_string()),
            url: entry.identity_string(),
            parameters: entry.parameter_string(),
            dynamic: entry.bool_parameter(keys::DYNAMIC, true),
            enabled: entry.bool_parameter(keys::ENABLED, true),
            weight: entry.int_parameter(keys::WEIGHT, DEFAULT_WEIGHT),
            username: entry.parameter(keys::OWNER).map(str::to_string),
            source: RegistrySource::Instance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerView {
    pub id: EntryId,
    pub service: ServiceKey,
    /// Consumer host (consumers register without a meaningful port).
    pub address: String,
    pub application: Option<String>,
    pub parameters: String,
}

impl ConsumerView {
    pub fn from_entry(id: &EntryId, entry: &RegistryEntry) -> Self {
        Self {
            id: id.clone(),
            service: entry.service_key(),
            address: entry.host().to_string(),
            application: entry.application().map(str::to_string),
            parameters: entry.parameter_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteView {
    pub id: EntryId,
    pub service: ServiceKey,
    pub name: Option<String>,
    pub priority: i64,
    pub enabled: bool,
    pub force: bool,
    pub dynamic: bool,
    pub runtime: bool,
    /// Percent-decoded rule text.
    pub rule: Option<String>,
}

impl RouteView {
    pub fn from_entry(id: &EntryId, entry: &RegistryEntry) -> Self {
        Self {
            id: id.clone(),
            service: entry.service_key(),
            name: entry.parameter(keys::NAME).map(str::to_string),
            priority: entry.int_parameter(keys::PRIORITY, 0),
            enabled: entry.bool_parameter(keys::ENABLED, true),
            force: entry.bool_parameter(keys::FORCE, false),
            dynamic: entry.bool_parameter(keys::DYNAMIC, false),
            runtime: entry.bool_parameter(keys::RUNTIME, false),
            rule: entry.parameter_decoded(keys::RULE),
        }
    }
}

/// Parameters describing the rule target rather than the override itself.
const OVERRIDE_IDENTITY_KEYS: [&str; 7] = [
    keys::INTERFACE,
    keys::GROUP,
    keys::VERSION,
    keys::APPLICATION,
    keys::CATEGORY,
    keys::DYNAMIC,
    keys::ENABLED,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideView {
    pub id: EntryId,
    pub service: ServiceKey,
    /// Absent when the override applies to any host.
    pub address: Option<String>,
    pub application: Option<String>,
    pub enabled: bool,
    /// Override parameters, target-identity keys removed.
    pub params: String,
}

impl OverrideView {
    pub fn from_entry(id: &EntryId, entry: &RegistryEntry) -> Self {
        let params: BTreeMap<&str, &str> = entry
            .parameters()
            .iter()
            .filter(|(k, _)| !OVERRIDE_IDENTITY_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let any_host = entry.bool_parameter(keys::ANYHOST, false) && entry.host() == "0.0.0.0";

        Self {
            id: id.clone(),
            service: entry.service_key(),
            address: (!any_host).then(|| entry.address()),
            application: entry
                .application()
                .or_else(|| entry.username())
                .map(str::to_string),
            enabled: entry.bool_parameter(keys::ENABLED, true),
            params: params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

/// One row of a service search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ServiceSummary {
    pub service: String,
    pub group: Option<String>,
    pub version: Option<String>,
    pub application: Option<String>,
    pub source: RegistrySource,
}

impl From<&ProviderView> for ServiceSummary {
    fn from(provider: &ProviderView) -> Self {
        Self {
            service: provider.service.interface().to_string(),
            group: provider.service.group().map(str::to_string),
            version: provider.service.version().map(str::to_string),
            application: provider.application.clone(),
            source: provider.source,
        }
    }
}
