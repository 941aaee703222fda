//! portmux integration test harness.
//!
//! Tests in this crate bind real TCP sockets on the loopback interface.
//! Ports are picked by asking the OS for a free one, then released before
//! the registry binds it, so a test can in rare cases race another process
//! for the same port.

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use portmux_services::{Frontend, HttpFrontend};

mod concurrency;
mod lifecycle;
mod registration;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const ANY: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// A port nothing is listening on right now.
pub fn free_port() -> Result<u16> {
    let probe = TcpListener::bind("127.0.0.1:0").context("failed to bind probe socket")?;
    Ok(probe.local_addr()?.port())
}

/// True if some socket currently holds `port` on the loopback address.
pub fn port_in_use(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// A front-end owning `prefixes`, ready to hand to the registry.
pub fn frontend(name: &str, prefixes: &[String]) -> Arc<dyn Frontend> {
    let f = prefixes
        .iter()
        .fold(HttpFrontend::new(name), |f, p| f.with_prefix(p));
    Arc::new(f)
}

/// `http://127.0.0.1:<port><path>`
pub fn local_prefix(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}
