use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use portmux_core::{FrontendConfig, ListenerError, TlsConfig};
use portmux_services::{EndpointRegistry, Frontend, HttpFrontend};

use crate::*;

#[test]
fn shared_port_prefixes_use_one_socket() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let f = frontend(
        "site",
        &[
            format!("http://+:{port}/app1/"),
            format!("http://+:{port}/app2/"),
        ],
    );

    registry.register_frontend(&f)?;
    assert_eq!(registry.len(), 1);
    assert!(port_in_use(port));

    let handle = registry.endpoint(ANY, port).expect("endpoint at the wildcard slot");
    assert_eq!(handle.prefixes().len(), 2);
    assert!(handle.prefixes().iter().all(|(_, owner)| owner.id() == f.id()));

    registry.unregister_frontend(f.as_ref());
    assert!(registry.is_empty());
    assert!(!port_in_use(port));
    Ok(())
}

#[test]
fn failed_batch_releases_every_socket() -> Result<()> {
    let (p1, p2) = (free_port()?, free_port()?);
    let registry = EndpointRegistry::new();
    let f = frontend(
        "broken",
        &[
            local_prefix(p1, "/a/"),
            local_prefix(p2, "/b/"),
            "http://203.0.113.7:8080/".to_string(),
        ],
    );

    let err = registry.register_frontend(&f).unwrap_err();
    assert!(matches!(err, ListenerError::BadHost(_)));
    assert!(registry.is_empty());
    assert!(registry.route(LOOPBACK, p1, "127.0.0.1", "/a/").is_none());
    assert!(registry.route(LOOPBACK, p2, "127.0.0.1", "/b/").is_none());
    assert!(!port_in_use(p1));
    assert!(!port_in_use(p2));
    Ok(())
}

#[test]
fn bind_failure_rolls_back_earlier_prefixes() -> Result<()> {
    let p1 = free_port()?;
    let held = std::net::TcpListener::bind("127.0.0.1:0")?;
    let p2 = held.local_addr()?.port();

    let registry = EndpointRegistry::new();
    let f = frontend("f", &[local_prefix(p1, "/"), local_prefix(p2, "/")]);

    let err = registry.register_frontend(&f).unwrap_err();
    assert!(matches!(err, ListenerError::Bind { port, .. } if port == p2));
    assert!(registry.is_empty());
    assert!(!port_in_use(p1));
    Ok(())
}

#[test]
fn secure_prefix_needs_a_certificate_source() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let f = frontend("tls", &[format!("https://127.0.0.1:{port}/")]);

    let err = registry.register_frontend(&f).unwrap_err();
    assert!(matches!(err, ListenerError::MissingCertificate { .. }));
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn plain_prefix_on_secure_endpoint_is_rejected() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let secure: Arc<dyn Frontend> = Arc::new(HttpFrontend::from_config(&FrontendConfig {
        name: "secure".into(),
        prefixes: vec![format!("https://127.0.0.1:{port}/secure/")],
        tls: TlsConfig {
            server_certificate: Some(PathBuf::from("/etc/portmux/server.pem")),
            ..TlsConfig::default()
        },
        ..FrontendConfig::default()
    }));
    registry.register_frontend(&secure)?;

    let plain = frontend("plain", &[local_prefix(port, "/plain/")]);
    let err = registry.register_frontend(&plain).unwrap_err();
    assert!(matches!(err, ListenerError::SchemeMismatch { .. }));

    let handle = registry.endpoint(LOOPBACK, port).expect("secure endpoint");
    assert!(handle.is_secure());
    assert_eq!(handle.prefixes().len(), 1);

    registry.unregister_frontend(secure.as_ref());
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn removing_unknown_prefixes_never_fails() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let f = frontend("f", &[local_prefix(port, "/")]);

    registry.remove_prefix(&local_prefix(port, "/"), f.as_ref());
    registry.remove_prefix("garbage", f.as_ref());
    registry.unregister_frontend(f.as_ref());
    assert!(registry.is_empty());
    Ok(())
}
