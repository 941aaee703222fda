//! Socket-level endpoint listener.
//!
//! Owns one bound TCP socket and the table of prefixes routed through it.
//! Accepting connections happens elsewhere; this type only holds the bind
//! and answers "which front-end owns this request".

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};

use portmux_core::{HostKind, ListenerError, UriPrefix};

use crate::endpoint::{EndpointHandle, EndpointId, EndpointSpec};
use crate::frontend::Frontend;

const BACKLOG: i32 = 511;

/// Routing precedence: `+` prefixes, then exact hosts, then `*` prefixes.
const MATCH_ORDER: [HostKind; 3] = [HostKind::StrongWildcard, HostKind::Named, HostKind::WeakWildcard];

pub struct EndpointListener {
    id: EndpointId,
    address: IpAddr,
    port: u16,
    secure: bool,
    certificate: Option<PathBuf>,
    socket: Mutex<Option<Socket>>,
    prefixes: DashMap<UriPrefix, Arc<dyn Frontend>>,
}

impl EndpointListener {
    /// Bind the socket described by `spec`.
    ///
    /// Secure endpoints need a certificate source: a `<port>.cer`/`<port>.key`
    /// pair in the certificate folder, or a server certificate in the TLS
    /// config.
    pub fn bind(spec: EndpointSpec) -> Result<Self, ListenerError> {
        let certificate = if spec.secure {
            let found = resolve_certificate(&spec);
            if found.is_none() {
                return Err(ListenerError::MissingCertificate {
                    address: spec.address,
                    port: spec.port,
                });
            }
            found
        } else {
            None
        };

        let socket = bind_socket(&spec).map_err(|source| ListenerError::Bind {
            address: spec.address,
            port: spec.port,
            source,
        })?;

        let listener = Self {
            id: EndpointId::next(),
            address: spec.address,
            port: spec.port,
            secure: spec.secure,
            certificate,
            socket: Mutex::new(Some(socket)),
            prefixes: DashMap::new(),
        };

        tracing::debug!(
            id = listener.id.get(),
            address = %listener.address,
            port = listener.port,
            secure = listener.secure,
            reuse_address = spec.reuse_address,
            client_certificate_required = spec.tls.client_certificate_required,
            "endpoint socket bound"
        );

        Ok(listener)
    }

    /// Certificate file this endpoint would serve, if secure.
    pub fn certificate(&self) -> Option<&Path> {
        self.certificate.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Address the socket is actually bound to, while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .and_then(|a| a.as_socket())
    }
}

impl EndpointHandle for EndpointListener {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn address(&self) -> IpAddr {
        self.address
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn add_prefix(&self, prefix: &UriPrefix, frontend: &Arc<dyn Frontend>) -> Result<(), ListenerError> {
        match self.prefixes.entry(prefix.clone()) {
            Entry::Occupied(owner) => {
                if owner.get().id() == frontend.id() {
                    Ok(())
                } else {
                    Err(ListenerError::PrefixCollision(prefix.to_string()))
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(frontend));
                Ok(())
            }
        }
    }

    fn remove_prefix(&self, prefix: &UriPrefix, frontend: &dyn Frontend) -> bool {
        self.prefixes
            .remove_if(prefix, |_, owner| owner.id() == frontend.id());
        self.prefixes.is_empty()
    }

    fn prefixes(&self) -> Vec<(UriPrefix, Arc<dyn Frontend>)> {
        self.prefixes
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    fn find_frontend(&self, host: &str, path: &str) -> Option<Arc<dyn Frontend>> {
        let host = strip_port(host);
        let with_slash = if path.ends_with('/') {
            None
        } else {
            Some(format!("{path}/"))
        };

        for kind in MATCH_ORDER {
            let mut best: Option<(usize, Arc<dyn Frontend>)> = None;

            for entry in self.prefixes.iter() {
                let prefix = entry.key();
                if prefix.host_kind() != kind {
                    continue;
                }
                if kind == HostKind::Named && !prefix.host().eq_ignore_ascii_case(host) {
                    continue;
                }

                let prefix_path = prefix.path();
                let matches = path.starts_with(prefix_path)
                    || with_slash.as_deref() == Some(prefix_path);
                let longer = best
                    .as_ref()
                    .map_or(true, |(len, _)| prefix_path.len() > *len);

                if matches && longer {
                    best = Some((prefix_path.len(), Arc::clone(entry.value())));
                }
            }

            if let Some((_, frontend)) = best {
                return Some(frontend);
            }
        }

        None
    }

    fn close(&self) {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if socket.is_some() {
            tracing::debug!(
                id = self.id.get(),
                address = %self.address,
                port = self.port,
                "endpoint socket closed"
            );
        }
    }
}

/// Host header value without its `:port` suffix. IPv6 literals keep their
/// brackets, matching how prefixes store them.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn bind_socket(spec: &EndpointSpec) -> std::io::Result<Socket> {
    let addr = SocketAddr::new(spec.address, spec.port);
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(spec.reuse_address)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket)
}

fn resolve_certificate(spec: &EndpointSpec) -> Option<PathBuf> {
    if let Some(folder) = &spec.certificate_folder {
        let cer = folder.join(format!("{}.cer", spec.port));
        let key = folder.join(format!("{}.key", spec.port));
        if cer.is_file() && key.is_file() {
            return Some(cer);
        }
    }
    spec.tls.server_certificate.clone()
}
