//! Endpoint registry — which handle owns each (address, port), and which
//! front-end owns each prefix on it.
//!
//! Every operation runs under one mutex covering the whole table, so a
//! lookup-then-create in `add_prefix` never races another thread, and a
//! batch in `register_frontend` (rollback included) is observed all at once.
//!
//! Slots are created on the first prefix that needs them and removed when
//! their handle reports it holds no prefixes, or when `remove_endpoint` is
//! called directly.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use portmux_core::addr::{is_acceptable_path, is_local, parse_port, resolve_host};
use portmux_core::{ListenerError, UriPrefix};

use crate::endpoint::{EndpointFactory, EndpointHandle, EndpointId, EndpointSpec, SocketEndpointFactory};
use crate::frontend::Frontend;

type Table = HashMap<IpAddr, HashMap<u16, Arc<dyn EndpointHandle>>>;

/// A validated prefix, ready to be placed at a slot.
struct Target {
    prefix: UriPrefix,
    address: IpAddr,
    port: u16,
}

/// Snapshot of one slot.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub id: u64,
    pub address: IpAddr,
    pub port: u16,
    pub secure: bool,
    pub prefixes: Vec<PrefixBinding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefixBinding {
    pub prefix: String,
    pub frontend: String,
}

pub struct EndpointRegistry {
    table: Mutex<Table>,
    factory: Arc<dyn EndpointFactory>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    /// Registry whose endpoints bind real TCP sockets.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(SocketEndpointFactory))
    }

    pub fn with_factory(factory: Arc<dyn EndpointFactory>) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            factory,
        }
    }

    /// Register every prefix of `frontend`, or none of them.
    ///
    /// On the first failure the prefixes added so far in this call are
    /// removed again and that failure is returned.
    pub fn register_frontend(&self, frontend: &Arc<dyn Frontend>) -> Result<(), ListenerError> {
        let mut table = self.lock();
        let prefixes = frontend.prefixes();
        let mut added: Vec<&str> = Vec::with_capacity(prefixes.len());

        for uri_prefix in &prefixes {
            if let Err(e) = self.add_prefix_locked(&mut table, uri_prefix, frontend) {
                tracing::warn!(
                    frontend = frontend.name(),
                    prefix = %uri_prefix,
                    rolled_back = added.len(),
                    error = %e,
                    "frontend registration failed, rolling back"
                );
                for done in added {
                    remove_prefix_locked(&mut table, done, frontend.as_ref());
                }
                return Err(e);
            }
            added.push(uri_prefix);
        }

        tracing::info!(
            frontend = frontend.name(),
            prefixes = prefixes.len(),
            "frontend registered"
        );
        Ok(())
    }

    /// Remove every prefix of `frontend`. Never fails.
    pub fn unregister_frontend(&self, frontend: &dyn Frontend) {
        let mut table = self.lock();
        for uri_prefix in frontend.prefixes() {
            remove_prefix_locked(&mut table, &uri_prefix, frontend);
        }
        tracing::info!(frontend = frontend.name(), "frontend unregistered");
    }

    /// Add a single prefix for `frontend`, creating the endpoint if needed.
    pub fn add_prefix(&self, uri_prefix: &str, frontend: &Arc<dyn Frontend>) -> Result<(), ListenerError> {
        let mut table = self.lock();
        self.add_prefix_locked(&mut table, uri_prefix, frontend)
    }

    /// Remove a single prefix for `frontend`. Invalid or unknown prefixes
    /// are ignored.
    pub fn remove_prefix(&self, uri_prefix: &str, frontend: &dyn Frontend) {
        let mut table = self.lock();
        remove_prefix_locked(&mut table, uri_prefix, frontend);
    }

    /// Take `endpoint` out of the table and close it.
    ///
    /// Does nothing and returns false if its slot is empty or holds a
    /// different handle, so each handle is closed at most once through here.
    pub fn remove_endpoint(&self, endpoint: &dyn EndpointHandle) -> bool {
        let mut table = self.lock();
        remove_endpoint_locked(&mut table, endpoint.address(), endpoint.port(), endpoint.id())
    }

    /// The handle at a slot, if any.
    pub fn endpoint(&self, address: IpAddr, port: u16) -> Option<Arc<dyn EndpointHandle>> {
        let table = self.lock();
        lookup(&table, address, port)
    }

    /// Snapshot of every slot, ordered by address then port.
    pub fn endpoints(&self) -> Vec<EndpointSummary> {
        let table = self.lock();
        let mut summaries: Vec<EndpointSummary> = table
            .values()
            .flat_map(|ports| ports.values())
            .map(|handle| {
                let mut prefixes: Vec<PrefixBinding> = handle
                    .prefixes()
                    .into_iter()
                    .map(|(prefix, frontend)| PrefixBinding {
                        prefix: prefix.to_string(),
                        frontend: frontend.name().to_string(),
                    })
                    .collect();
                prefixes.sort_by(|a, b| a.prefix.cmp(&b.prefix));
                EndpointSummary {
                    id: handle.id().get(),
                    address: handle.address(),
                    port: handle.port(),
                    secure: handle.is_secure(),
                    prefixes,
                }
            })
            .collect();
        summaries.sort_by(|a, b| (a.address, a.port).cmp(&(b.address, b.port)));
        summaries
    }

    /// The front-end a request arriving at `address:port` with the given
    /// host and path would reach.
    pub fn route(&self, address: IpAddr, port: u16, host: &str, path: &str) -> Option<Arc<dyn Frontend>> {
        let handle = self.endpoint(address, port)?;
        handle.find_frontend(host, path)
    }

    /// Number of live endpoints.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Each step leaves the table consistent, so a panic elsewhere while
    // holding the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_prefix_locked(
        &self,
        table: &mut Table,
        uri_prefix: &str,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<(), ListenerError> {
        let target = validate(uri_prefix)?;
        let secure = target.prefix.is_secure();

        let (handle, created) = match lookup(table, target.address, target.port) {
            Some(existing) => {
                if existing.is_secure() != secure {
                    return Err(ListenerError::SchemeMismatch {
                        address: target.address,
                        port: target.port,
                    });
                }
                (existing, false)
            }
            None => {
                let spec = EndpointSpec::for_frontend(target.address, target.port, secure, frontend.as_ref());
                let handle = self.factory.create(spec)?;
                table
                    .entry(target.address)
                    .or_default()
                    .insert(target.port, Arc::clone(&handle));
                tracing::info!(
                    id = handle.id().get(),
                    address = %target.address,
                    port = target.port,
                    secure,
                    "endpoint created"
                );
                (handle, true)
            }
        };

        if let Err(e) = handle.add_prefix(&target.prefix, frontend) {
            if created {
                remove_endpoint_locked(table, target.address, target.port, handle.id());
            }
            return Err(e);
        }

        tracing::trace!(
            frontend = frontend.name(),
            prefix = target.prefix.original(),
            endpoint = handle.id().get(),
            "prefix added"
        );
        Ok(())
    }
}

/// Parse `uri_prefix` and apply the host, port and path rules.
fn validate(uri_prefix: &str) -> Result<Target, ListenerError> {
    let prefix = UriPrefix::parse(uri_prefix)?;

    let address = resolve_host(prefix.host())
        .filter(is_local)
        .ok_or_else(|| ListenerError::BadHost(prefix.host().to_string()))?;

    let port = parse_port(prefix.port()).ok_or_else(|| ListenerError::BadPort(prefix.port().to_string()))?;

    if !is_acceptable_path(prefix.path()) {
        return Err(ListenerError::BadPath(prefix.path().to_string()));
    }

    Ok(Target {
        prefix,
        address,
        port,
    })
}

fn lookup(table: &Table, address: IpAddr, port: u16) -> Option<Arc<dyn EndpointHandle>> {
    table.get(&address)?.get(&port).cloned()
}

fn remove_prefix_locked(table: &mut Table, uri_prefix: &str, frontend: &dyn Frontend) {
    let target = match validate(uri_prefix) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(prefix = uri_prefix, error = %e, "ignoring invalid prefix on removal");
            return;
        }
    };

    let handle = match lookup(table, target.address, target.port) {
        Some(h) => h,
        None => return,
    };
    if handle.is_secure() != target.prefix.is_secure() {
        return;
    }

    if handle.remove_prefix(&target.prefix, frontend) {
        remove_endpoint_locked(table, target.address, target.port, handle.id());
    }
}

fn remove_endpoint_locked(table: &mut Table, address: IpAddr, port: u16, id: EndpointId) -> bool {
    let ports = match table.get_mut(&address) {
        Some(p) => p,
        None => return false,
    };
    if ports.get(&port).map(|h| h.id()) != Some(id) {
        return false;
    }

    let handle = match ports.remove(&port) {
        Some(h) => h,
        None => return false,
    };
    if ports.is_empty() {
        table.remove(&address);
    }

    handle.close();
    tracing::info!(id = id.get(), address = %address, port, "endpoint removed");
    true
}
