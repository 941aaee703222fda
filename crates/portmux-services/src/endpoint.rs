//! Endpoint handles — the shared socket owners the registry places at each
//! (address, port) slot.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use portmux_core::{ListenerError, TlsConfig, UriPrefix};

use crate::frontend::Frontend;
use crate::listener::EndpointListener;

/// Process-unique identity of an endpoint handle. A slot that is emptied and
/// refilled gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Everything needed to create the handle for a new slot.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub address: IpAddr,
    pub port: u16,
    pub secure: bool,
    pub certificate_folder: Option<PathBuf>,
    pub tls: TlsConfig,
    pub reuse_address: bool,
}

impl EndpointSpec {
    /// Spec for a slot first claimed by `frontend`. The front-end's
    /// certificate, TLS and reuse settings become the endpoint's.
    pub fn for_frontend(address: IpAddr, port: u16, secure: bool, frontend: &dyn Frontend) -> Self {
        Self {
            address,
            port,
            secure,
            certificate_folder: frontend.certificate_folder().map(PathBuf::from),
            tls: frontend.tls_config().clone(),
            reuse_address: frontend.reuse_address(),
        }
    }
}

/// A bound endpoint shared by every front-end with a prefix at its slot.
///
/// Implementations synchronize their own prefix table; the registry may call
/// `add_prefix`/`remove_prefix` while other threads route through
/// `find_frontend`.
pub trait EndpointHandle: Send + Sync {
    fn id(&self) -> EndpointId;

    fn address(&self) -> IpAddr;

    fn port(&self) -> u16;

    fn is_secure(&self) -> bool;

    /// Associate `prefix` with `frontend`.
    ///
    /// Re-adding a prefix the same front-end already owns succeeds without
    /// change. A prefix owned by another front-end is a
    /// [`ListenerError::PrefixCollision`].
    fn add_prefix(&self, prefix: &UriPrefix, frontend: &Arc<dyn Frontend>) -> Result<(), ListenerError>;

    /// Drop the association if `frontend` owns `prefix`. Returns true if the
    /// handle holds no prefixes afterwards.
    fn remove_prefix(&self, prefix: &UriPrefix, frontend: &dyn Frontend) -> bool;

    /// Current prefix associations.
    fn prefixes(&self) -> Vec<(UriPrefix, Arc<dyn Frontend>)>;

    /// The front-end a request for `host` and `path` reaches, if any.
    fn find_frontend(&self, host: &str, path: &str) -> Option<Arc<dyn Frontend>>;

    /// Release the bound socket. Idempotent.
    fn close(&self);
}

/// Creates the handle for a slot the registry has not seen yet.
pub trait EndpointFactory: Send + Sync {
    fn create(&self, spec: EndpointSpec) -> Result<Arc<dyn EndpointHandle>, ListenerError>;
}

/// Factory producing real [`EndpointListener`]s bound to TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketEndpointFactory;

impl EndpointFactory for SocketEndpointFactory {
    fn create(&self, spec: EndpointSpec) -> Result<Arc<dyn EndpointHandle>, ListenerError> {
        let listener = EndpointListener::bind(spec)?;
        Ok(Arc::new(listener))
    }
}
