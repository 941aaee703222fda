//! URI prefix descriptor.
//!
//! A prefix looks like `scheme://host[:port]/path/`:
//!   scheme — `http` or `https` (the latter marks the prefix secure)
//!   host   — `+` (strong wildcard), `*` (weak wildcard), a name or an IP
//!            literal; IPv6 literals keep their brackets
//!   port   — kept as the raw token; defaults to 80/443 by scheme
//!   path   — everything from the first `/` after the host, always ends in `/`
//!
//! Parsing only checks the shape. Whether the host is local, the port is in
//! range or the path is acceptable is decided by the registry.

use std::fmt;

use crate::error::PrefixError;

const HTTP: &str = "http://";
const HTTPS: &str = "https://";

/// How a prefix host participates in request routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// `+`: matches every request before any named host.
    StrongWildcard,
    /// A concrete host name or address.
    Named,
    /// `*`: matches only requests no other prefix claims.
    WeakWildcard,
}

/// A parsed URI prefix. Equality and hashing use the normalized form.
#[derive(Debug, Clone)]
pub struct UriPrefix {
    original: String,
    normalized: String,
    host: String,
    port: String,
    path: String,
    secure: bool,
}

impl UriPrefix {
    /// Check the shape of a prefix string and split it into components.
    pub fn parse(uri_prefix: &str) -> Result<Self, PrefixError> {
        check(uri_prefix)?;

        let secure = uri_prefix.starts_with(HTTPS);
        let host_start = if secure { HTTPS.len() } else { HTTP.len() };
        // check() guarantees a '/' after the host
        let root = uri_prefix[host_start..]
            .find('/')
            .map(|i| host_start + i)
            .ok_or(PrefixError::MissingHost)?;

        let authority = &uri_prefix[host_start..root];
        let (host, port) = match authority.rfind(':') {
            Some(colon) if colon > 0 && !authority.ends_with(']') => {
                (&authority[..colon], authority[colon + 1..].to_string())
            }
            _ => (authority, default_port(secure).to_string()),
        };
        let path = &uri_prefix[root..];

        let normalized = format!(
            "{}://{}:{}{}",
            if secure { "https" } else { "http" },
            host,
            port,
            path
        );

        Ok(Self {
            original: uri_prefix.to_string(),
            normalized,
            host: host.to_string(),
            port,
            path: path.to_string(),
            secure,
        })
    }

    /// The string this prefix was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Raw port token. Not guaranteed to be numeric.
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host_kind(&self) -> HostKind {
        match self.host.as_str() {
            "+" => HostKind::StrongWildcard,
            "*" => HostKind::WeakWildcard,
            _ => HostKind::Named,
        }
    }
}

impl PartialEq for UriPrefix {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for UriPrefix {}

impl std::hash::Hash for UriPrefix {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for UriPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

fn default_port(secure: bool) -> &'static str {
    if secure {
        "443"
    } else {
        "80"
    }
}

fn check(uri_prefix: &str) -> Result<(), PrefixError> {
    if uri_prefix.is_empty() {
        return Err(PrefixError::Empty);
    }

    let host_start = if uri_prefix.starts_with(HTTP) {
        HTTP.len()
    } else if uri_prefix.starts_with(HTTPS) {
        HTTPS.len()
    } else {
        return Err(PrefixError::UnsupportedScheme);
    };

    if !uri_prefix.ends_with('/') {
        return Err(PrefixError::MissingTrailingSlash);
    }

    let rest = &uri_prefix[host_start..];
    if rest.len() <= 1 || rest.starts_with(':') || rest.starts_with('/') {
        return Err(PrefixError::MissingHost);
    }

    let root = rest.find('/').ok_or(PrefixError::MissingHost)?;
    if rest[..root].ends_with(':') {
        return Err(PrefixError::MissingPort);
    }

    Ok(())
}
