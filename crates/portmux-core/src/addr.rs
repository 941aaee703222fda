//! Endpoint rules applied to a parsed prefix: host locality, port range,
//! path shape.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Resolve a prefix host token to the address an endpoint binds.
///
/// `*` and `+` both mean "any local address". IP literals (bracketed or not)
/// parse directly; anything else goes through name resolution and the first
/// result wins. Returns None if nothing resolves.
pub fn resolve_host(host: &str) -> Option<IpAddr> {
    if host == "*" || host == "+" {
        return Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(addr) = bare.parse::<IpAddr>() {
        return Some(addr);
    }

    (bare, 0u16)
        .to_socket_addrs()
        .ok()?
        .next()
        .map(|sa| sa.ip())
}

/// True if `addr` is one this host can bind: unspecified, loopback, or
/// assigned to a local interface.
pub fn is_local(addr: &IpAddr) -> bool {
    if addr.is_unspecified() || addr.is_loopback() {
        return true;
    }
    interface_addresses().contains(addr)
}

/// Parse a port token. Accepts anything `i32` parses, then requires
/// `1..=65535`.
pub fn parse_port(token: &str) -> Option<u16> {
    let port: i32 = token.parse().ok()?;
    if (1..=65535).contains(&port) {
        u16::try_from(port).ok()
    } else {
        None
    }
}

/// Paths with escapes or empty segments are ambiguous to match against.
pub fn is_acceptable_path(path: &str) -> bool {
    !path.contains('%') && !path.contains("//")
}

fn interface_addresses() -> Vec<IpAddr> {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(a) => a,
        Err(_) => return Vec::new(),
    };

    addrs
        .filter_map(|ifa| {
            let storage = ifa.address?;
            if let Some(v4) = storage.as_sockaddr_in() {
                return Some(IpAddr::V4(v4.ip()));
            }
            storage.as_sockaddr_in6().map(|v6| IpAddr::V6(v6.ip()))
        })
        .collect()
}
