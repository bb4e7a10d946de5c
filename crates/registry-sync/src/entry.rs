// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry entries.
//!
//! A [`RegistryEntry`] is one registered endpoint (or rule) at a point in time,
//! carried on the wire as a URL-like record:
//!
//! ```text
//! protocol://[user[:password]@]host[:port][/path][?key1=value1&key2=value2...]
//! ```
//!
//! Entries are immutable; any change produces a new entry. Parameters are kept
//! sorted so that [`RegistryEntry::full_string`] is canonical.

use crate::category::Category;
use crate::service_key::{ServiceKey, ANY_VALUE};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Well-known parameter keys.
pub mod keys {
    pub const CATEGORY: &str = "category";
    pub const INTERFACE: &str = "interface";
    pub const GROUP: &str = "group";
    pub const VERSION: &str = "version";
    pub const APPLICATION: &str = "application";
    pub const ENABLED: &str = "enabled";
    pub const DYNAMIC: &str = "dynamic";
    pub const WEIGHT: &str = "weight";
    pub const RULE: &str = "rule";
    pub const NAME: &str = "name";
    pub const PRIORITY: &str = "priority";
    pub const FORCE: &str = "force";
    pub const RUNTIME: &str = "runtime";
    pub const OWNER: &str = "owner";
    pub const ANYHOST: &str = "anyhost";
    pub const CLASSIFIER: &str = "classifier";
    pub const CHECK: &str = "check";
    pub const RELEASE: &str = "release";
}

/// Protocol of the out-of-band withdrawal record.
pub const EMPTY_PROTOCOL: &str = "empty";

/// Default provider weight.
pub const DEFAULT_WEIGHT: i64 = 100;

/// Errors produced while parsing a registry record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryParseError {
    #[error("Missing \"://\" separator in {0:?}")]
    MissingScheme(String),

    #[error("Empty protocol in {0:?}")]
    EmptyProtocol(String),

    #[error("Invalid port {port:?} in {url:?}")]
    InvalidPort { url: String, port: String },

    #[error("Parameter with empty key in {0:?}")]
    EmptyParameterKey(String),
}

/// One registry record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryEntry {
    protocol: String,
    username: Option<String>,
    password: Option<String>,
    host: String,
    port: u16,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl RegistryEntry {
    /// Create an entry without parameters.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            username: None,
            password: None,
            host: host.into(),
            port,
            path: path.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Return a copy with `key=value` added (or replaced).
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Parse a URL-like registry record.
    pub fn parse(url: &str) -> Result<Self, EntryParseError> {
        let url = url.trim();
        let (protocol, rest) = url
            .split_once("://")
            .ok_or_else(|| EntryParseError::MissingScheme(url.to_string()))?;
        if protocol.is_empty() {
            return Err(EntryParseError::EmptyProtocol(url.to_string()));
        }

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let (credentials, host_port) = match authority.rsplit_once('@') {
            Some((credentials, host_port)) => (Some(credentials), host_port),
            None => (None, authority),
        };
        let (username, password) = match credentials {
            Some(c) => match c.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(c.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(host_port).map_err(|port| EntryParseError::InvalidPort {
            url: url.to_string(),
            port,
        })?;

        let mut parameters = BTreeMap::new();
        if let Some(query) = query {
            for part in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = part.split_once('=').unwrap_or((part, part));
                if key.is_empty() {
                    return Err(EntryParseError::EmptyParameterKey(url.to_string()));
                }
                parameters.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Self {
            protocol: protocol.to_string(),
            username,
            password,
            host: host.to_string(),
            port,
            path: path.to_string(),
            parameters,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// `host:port`, or the bare host when no port is set.
    pub fn address(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Raw parameter value.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Parameter value, or `default` when missing or empty.
    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.parameter(key) {
            Some(v) if !v.is_empty() => v,
            _ => default,
        }
    }

    /// Boolean parameter; unparseable values fall back to `default`.
    pub fn bool_parameter(&self, key: &str, default: bool) -> bool {
        self.parameter(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Integer parameter; unparseable values fall back to `default`.
    pub fn int_parameter(&self, key: &str, default: i64) -> i64 {
        self.parameter(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Form-decoded parameter value (route rules are sent encoded).
    ///
    /// `+` decodes to a space before percent escapes are resolved.
    pub fn parameter_decoded(&self, key: &str) -> Option<String> {
        self.parameter(key).map(|raw| {
            let spaced = raw.replace('+', " ");
            let decoded = urlencoding::decode(&spaced).map(|d| d.into_owned());
            decoded.unwrap_or(spaced)
        })
    }

    /// True for the `empty` withdrawal protocol.
    pub fn is_empty_protocol(&self) -> bool {
        self.protocol.eq_ignore_ascii_case(EMPTY_PROTOCOL)
    }

    /// Service interface: the `interface` parameter unless blank or wildcard,
    /// otherwise the path.
    pub fn service_interface(&self) -> &str {
        match self.parameter(keys::INTERFACE) {
            Some(i) if !i.trim().is_empty() && i != ANY_VALUE => i,
            _ => &self.path,
        }
    }

    /// Service key built from interface, group and version.
    pub fn service_key(&self) -> ServiceKey {
        ServiceKey::new(
            self.service_interface(),
            self.parameter(keys::GROUP),
            self.parameter(keys::VERSION),
        )
    }

    /// Category of this record, defaulting to providers.
    pub fn category(&self) -> Category {
        Category::from_param(self.parameter(keys::CATEGORY))
    }

    /// Application name, if advertised.
    pub fn application(&self) -> Option<&str> {
        self.parameter(keys::APPLICATION)
    }

    /// `protocol://[user[:password]@]host[:port]/path` without parameters.
    pub fn identity_string(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push_str(&self.protocol);
        out.push_str("://");
        if let Some(user) = &self.username {
            out.push_str(user);
            if let Some(pass) = &self.password {
                out.push(':');
                out.push_str(pass);
            }
            out.push('@');
        }
        // Bracketed IPv6 literal: [fe80::1]:20880
        if self.host.contains(':') {
            out.push('[');
            out.push_str(&self.host);
            out.push(']');
        } else {
            out.push_str(&self.host);
        }
        if self.port != 0 {
            out.push(':');
            out.push_str(&self.port.to_string());
        }
        out.push('/');
        out.push_str(&self.path);
        out
    }

    /// `k1=v1&k2=v2...` in key order.
    pub fn parameter_string(&self) -> String {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Canonical full form: identity plus every parameter in key order.
    pub fn full_string(&self) -> String {
        let mut out = self.identity_string();
        if !self.parameters.is_empty() {
            out.push('?');
            out.push_str(&self.parameter_string());
        }
        out
    }
}

/// Split `host[:port]`, returning the offending port text on failure.
fn split_host_port(host_port: &str) -> Result<(&str, u16), String> {
    // Bracketed IPv6 literal: [::1]:20880
    if let Some(stripped) = host_port.strip_prefix('[') {
        if let Some((host, tail)) = stripped.split_once(']') {
            return match tail.strip_prefix(':') {
                Some(port) => port.parse().map(|p| (host, p)).map_err(|_| port.to_string()),
                None => Ok((host, 0)),
            };
        }
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) => port
            .parse()
            .map(|p| (host, p))
            .map_err(|_| port.to_string()),
        None => Ok((host_port, 0)),
    }
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_string())
    }
}

impl FromStr for RegistryEntry {
    type Err = EntryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
