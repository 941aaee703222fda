use anyhow::Result;
use portmux_core::ListenerError;
use portmux_services::EndpointRegistry;

use crate::*;

#[test]
fn endpoint_outlives_one_of_two_frontends() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let a = frontend("a", &[local_prefix(port, "/a/")]);
    let b = frontend("b", &[local_prefix(port, "/b/")]);

    registry.register_frontend(&a)?;
    registry.register_frontend(&b)?;
    assert_eq!(registry.len(), 1);

    registry.unregister_frontend(a.as_ref());
    assert!(port_in_use(port));
    let routed = registry.route(LOOPBACK, port, "127.0.0.1", "/b/index");
    assert_eq!(routed.map(|f| f.id()), Some(b.id()));
    assert!(registry.route(LOOPBACK, port, "127.0.0.1", "/a/index").is_none());

    registry.unregister_frontend(b.as_ref());
    assert!(!port_in_use(port));
    Ok(())
}

#[test]
fn forced_removal_then_fresh_endpoint() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let f = frontend("f", &[local_prefix(port, "/")]);

    registry.register_frontend(&f)?;
    let first = registry.endpoint(LOOPBACK, port).expect("first endpoint");
    assert!(registry.remove_endpoint(first.as_ref()));
    assert!(!port_in_use(port));
    assert!(registry.route(LOOPBACK, port, "127.0.0.1", "/").is_none());

    registry.add_prefix(&local_prefix(port, "/"), &f)?;
    let second = registry.endpoint(LOOPBACK, port).expect("second endpoint");
    assert_ne!(first.id(), second.id());
    assert!(port_in_use(port));

    // the old handle no longer owns the slot
    assert!(!registry.remove_endpoint(first.as_ref()));
    assert!(port_in_use(port));

    registry.unregister_frontend(f.as_ref());
    assert!(!port_in_use(port));
    Ok(())
}

#[test]
fn prefix_ownership_is_exclusive() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let a = frontend("a", &[local_prefix(port, "/shared/")]);
    let b = frontend("b", &[local_prefix(port, "/shared/")]);

    registry.register_frontend(&a)?;
    registry.register_frontend(&a)?;

    let err = registry.register_frontend(&b).unwrap_err();
    assert!(matches!(err, ListenerError::PrefixCollision(_)));

    // b's removal does not touch a's prefix
    registry.unregister_frontend(b.as_ref());
    let routed = registry.route(LOOPBACK, port, "127.0.0.1", "/shared/");
    assert_eq!(routed.map(|f| f.id()), Some(a.id()));

    registry.unregister_frontend(a.as_ref());
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn endpoints_snapshot_lists_owners() -> Result<()> {
    let port = free_port()?;
    let registry = EndpointRegistry::new();
    let a = frontend("alpha", &[local_prefix(port, "/a/")]);
    let b = frontend("beta", &[local_prefix(port, "/b/")]);
    registry.register_frontend(&a)?;
    registry.register_frontend(&b)?;

    let snapshot = registry.endpoints();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].address, LOOPBACK);
    assert_eq!(snapshot[0].port, port);
    assert!(!snapshot[0].secure);
    let owners: Vec<&str> = snapshot[0].prefixes.iter().map(|p| p.frontend.as_str()).collect();
    assert_eq!(owners, vec!["alpha", "beta"]);

    registry.unregister_frontend(a.as_ref());
    registry.unregister_frontend(b.as_ref());
    Ok(())
}
