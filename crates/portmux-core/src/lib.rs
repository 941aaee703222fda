//! portmux-core — prefix descriptors, endpoint rules, errors and configuration.
//! All other portmux crates depend on this one.

pub mod addr;
pub mod config;
pub mod error;
pub mod prefix;

pub use config::{FrontendConfig, TlsConfig};
pub use error::{ListenerError, PrefixError};
pub use prefix::{HostKind, UriPrefix};
