//! Listener front-ends — the owners of URI prefixes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use portmux_core::{FrontendConfig, TlsConfig};

/// Process-unique identity of a front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontendId(u64);

impl FrontendId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// What the registry needs from a front-end.
///
/// Certificate folder, TLS config and reuse flag are handed to newly created
/// endpoints without interpretation.
pub trait Frontend: Send + Sync {
    fn id(&self) -> FrontendId;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Snapshot of the prefix strings this front-end owns.
    fn prefixes(&self) -> Vec<String>;

    fn certificate_folder(&self) -> Option<&Path>;

    fn tls_config(&self) -> &TlsConfig;

    fn reuse_address(&self) -> bool;
}

/// A named front-end built from configuration.
#[derive(Debug)]
pub struct HttpFrontend {
    id: FrontendId,
    name: String,
    prefixes: RwLock<Vec<String>>,
    certificate_folder: Option<PathBuf>,
    tls: TlsConfig,
    reuse_address: bool,
}

impl HttpFrontend {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(&FrontendConfig {
            name: name.into(),
            ..FrontendConfig::default()
        })
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        let frontend = Self {
            id: FrontendId::next(),
            name: config.name.clone(),
            prefixes: RwLock::new(Vec::new()),
            certificate_folder: config.certificate_folder.clone(),
            tls: config.tls.clone(),
            reuse_address: config.reuse_address,
        };
        for prefix in &config.prefixes {
            frontend.add_prefix(prefix);
        }
        frontend
    }

    /// Builder-style prefix addition.
    pub fn with_prefix(self, prefix: &str) -> Self {
        self.add_prefix(prefix);
        self
    }

    /// Record a prefix. Returns false if it was already present.
    ///
    /// This only changes the owned set; registering with the endpoint
    /// registry is the caller's job.
    pub fn add_prefix(&self, prefix: &str) -> bool {
        let mut prefixes = self.prefixes.write().unwrap_or_else(PoisonError::into_inner);
        if prefixes.iter().any(|p| p == prefix) {
            return false;
        }
        prefixes.push(prefix.to_string());
        true
    }

    /// Forget a prefix. Returns false if it was not present.
    pub fn remove_prefix(&self, prefix: &str) -> bool {
        let mut prefixes = self.prefixes.write().unwrap_or_else(PoisonError::into_inner);
        let before = prefixes.len();
        prefixes.retain(|p| p != prefix);
        prefixes.len() != before
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p == prefix)
    }
}

impl Frontend for HttpFrontend {
    fn id(&self) -> FrontendId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn prefixes(&self) -> Vec<String> {
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn certificate_folder(&self) -> Option<&Path> {
        self.certificate_folder.as_deref()
    }

    fn tls_config(&self) -> &TlsConfig {
        &self.tls
    }

    fn reuse_address(&self) -> bool {
        self.reuse_address
    }
}

/// Front-ends started by the daemon or the API, keyed on name.
pub type FrontendTable = Arc<DashMap<String, Arc<HttpFrontend>>>;

/// Create a new empty front-end table.
pub fn new_frontend_table() -> FrontendTable {
    Arc::new(DashMap::new())
}
