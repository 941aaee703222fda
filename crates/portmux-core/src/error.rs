//! Error taxonomy for prefix registration.
//!
//! Only "add"-style operations surface these. Removal paths swallow them.

use std::net::IpAddr;

/// Malformed URI prefix string. Raised while parsing, before any endpoint
/// rule is checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("an empty string")]
    Empty,

    #[error("the scheme is not 'http' or 'https'")]
    UnsupportedScheme,

    #[error("it ends without '/'")]
    MissingTrailingSlash,

    #[error("no host is specified")]
    MissingHost,

    #[error("no port is specified")]
    MissingPort,
}

/// Failure while adding a prefix to the endpoint registry.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid prefix: {0}")]
    BadPrefix(#[from] PrefixError),

    #[error("includes an invalid host: {0}")]
    BadHost(String),

    #[error("includes an invalid port: {0}")]
    BadPort(String),

    #[error("includes an invalid path: {0}")]
    BadPath(String),

    #[error("includes an invalid scheme: {address}:{port} is bound with the other scheme")]
    SchemeMismatch { address: IpAddr, port: u16 },

    #[error("there is another listener for {0}")]
    PrefixCollision(String),

    #[error("no server certificate could be found for {address}:{port}")]
    MissingCertificate { address: IpAddr, port: u16 },

    #[error("failed to bind {address}:{port}: {source}")]
    Bind {
        address: IpAddr,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_error_converts_to_bad_prefix() {
        let err: ListenerError = PrefixError::MissingHost.into();
        assert!(matches!(err, ListenerError::BadPrefix(PrefixError::MissingHost)));
        assert_eq!(err.to_string(), "invalid prefix: no host is specified");
    }

    #[test]
    fn scheme_mismatch_names_the_endpoint() {
        let err = ListenerError::SchemeMismatch {
            address: "127.0.0.1".parse().unwrap(),
            port: 8443,
        };
        assert!(err.to_string().contains("127.0.0.1:8443"));
    }
}
