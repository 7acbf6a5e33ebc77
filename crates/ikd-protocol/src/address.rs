//! Routing addresses for the pub/sub messaging fabric.
//!
//! An [`Address`] mirrors an XMPP-style JID: `local@host/resource`, with
//! `local` and `resource` optional. Two addresses compare equal on their
//! bare form (`local@host`) unless a full comparison (including resource)
//! is explicitly requested.

use std::fmt;

#[derive(Debug, Clone, Eq)]
pub struct Address {
    pub host: String,
    pub local: Option<String>,
    pub resource: Option<String>,
}

impl Address {
    pub fn new(host: impl Into<String>) -> Self {
        Address {
            host: host.into(),
            local: None,
            resource: None,
        }
    }

    pub fn with_local(mut self, local: impl Into<String>) -> Self {
        self.local = Some(local.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Parse `local@host/resource`, `local@host`, or bare `host`.
    pub fn parse(raw: &str) -> Option<Address> {
        if raw.is_empty() {
            return None;
        }
        let (rest, resource) = match raw.split_once('/') {
            Some((rest, resource)) => (rest, Some(resource.to_owned())),
            None => (raw, None),
        };
        let (local, host) = match rest.split_once('@') {
            Some((local, host)) => (Some(local.to_owned()), host.to_owned()),
            None => (None, rest.to_owned()),
        };
        if host.is_empty() {
            return None;
        }
        Some(Address {
            host,
            local,
            resource,
        })
    }

    /// The `local@host` (or bare `host`) form, dropping any resource.
    pub fn bare(&self) -> Address {
        Address {
            host: self.host.clone(),
            local: self.local.clone(),
            resource: None,
        }
    }

    /// Full equality, including resource.
    pub fn eq_full(&self, other: &Address) -> bool {
        self.host == other.host && self.local == other.local && self.resource == other.resource
    }
}

/// Bare-form equality — the default, per the data model invariant.
impl PartialEq for Address {
    fn eq(&self, other: &Address) -> bool {
        self.host == other.host && self.local == other.local
    }
}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@{}", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

/// Derive the pub/sub service host that owns a given resource URI.
///
/// Strips a leading `www.`; unless the resulting host ends in `.local` or
/// contains `.test.`, prepends `pubsub.`.
pub fn pubsub_host_of(uri: &str) -> Option<String> {
    let host = host_of(uri)?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();
    if host.ends_with(".local") || host.contains(".test.") || host.starts_with("pubsub.") {
        Some(host)
    } else {
        Some(format!("pubsub.{host}"))
    }
}

/// Extract the host component of a `scheme://host[:port]/path` URI.
pub fn host_of(uri: &str) -> Option<String> {
    let after_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let host_port = after_scheme.split('/').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_owned())
    }
}

/// Extract the trailing integer path segment of a URI, e.g.
/// `http://example.com/id/160225` -> `160225`.
pub fn id_of(uri: &str) -> Option<i64> {
    let path = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let last_segment = path.rsplit('/').next()?;
    last_segment.parse::<i64>().ok()
}
