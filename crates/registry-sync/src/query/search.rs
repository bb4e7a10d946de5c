// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service search with glob-style fuzzy matching.

use super::QueryEngine;
use crate::error::SyncError;
use crate::service_key::ServiceKey;
use crate::views::{ProviderView, ServiceSummary};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// What a search filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// Service key or interface name.
    Service,
    Application,
    /// Provider host or `host:port`.
    Ip,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Application => "application",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown search kind: {0:?} (expected service, application or ip)")]
pub struct UnknownSearchKind(pub String);

impl FromStr for SearchKind {
    type Err = UnknownSearchKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "application" => Ok(Self::Application),
            "ip" => Ok(Self::Ip),
            _ => Err(UnknownSearchKind(s.to_string())),
        }
    }
}

/// True if `filter` contains a glob wildcard (`*` or `?`).
pub fn is_fuzzy(filter: &str) -> bool {
    filter.contains(['*', '?'])
}

fn glob_regex(filter: &str) -> Result<Regex, SyncError> {
    let mut pattern = String::with_capacity(filter.len() + 8);
    pattern.push('^');
    let mut buf = [0u8; 4];
    for c in filter.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SyncError::Query(format!("bad search pattern {:?}: {}", filter, e)))
}

/// Candidates matching the glob `filter`, case-insensitively. A candidate
/// counts when the pattern matches it entirely or matches a prefix of it.
pub fn fuzzy_match<I, S>(candidates: I, filter: &str) -> Result<Vec<String>, SyncError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let regex = glob_regex(filter)?;
    Ok(candidates
        .into_iter()
        .filter(|c| regex.is_match(c.as_ref()))
        .map(|c| c.as_ref().to_string())
        .collect())
}

fn host_of(address: &str) -> &str {
    address.rsplit_once(':').map_or(address, |(host, _)| host)
}

impl QueryEngine {
    /// Search providers by service, application or IP.
    ///
    /// Without wildcards the filter is an exact lookup; with `*`/`?` it is matched
    /// against the candidate names of `kind` and the providers of every matching
    /// candidate are collected.
    pub fn search(
        &self,
        kind: SearchKind,
        filter: &str,
    ) -> Result<BTreeSet<ServiceSummary>, SyncError> {
        let filter = filter.trim();
        if filter.is_empty() {
            return Err(SyncError::Query("empty search filter".into()));
        }

        let names: Vec<String> = if is_fuzzy(filter) {
            let candidates = match kind {
                SearchKind::Service => self.services(),
                SearchKind::Application => self.applications(),
                SearchKind::Ip => self.addresses(),
            };
            fuzzy_match(&candidates, filter)?
        } else {
            vec![filter.to_string()]
        };

        let mut found = BTreeSet::new();
        for name in &names {
            let providers = match kind {
                SearchKind::Service => self.providers_matching_service(name),
                SearchKind::Application => self.providers_by_application(name),
                SearchKind::Ip => self
                    .all_providers()
                    .into_iter()
                    .filter(|p| p.address == *name || host_of(&p.address) == name.as_str())
                    .collect(),
            };
            found.extend(providers.iter().map(ServiceSummary::from));
        }
        Ok(found)
    }

    /// Providers whose service key, or bare interface name, equals `name`.
    fn providers_matching_service(&self, name: &str) -> Vec<ProviderView> {
        match name.parse::<ServiceKey>() {
            Ok(key) if self.services().contains(&key.to_string()) => self.providers_by_service(&key),
            _ => self
                .all_providers()
                .into_iter()
                .filter(|p| p.service.interface() == name)
                .collect(),
        }
    }
}
