use std::sync::Arc;
use std::thread;

use anyhow::Result;
use portmux_services::EndpointRegistry;

use crate::*;

#[test]
fn concurrent_start_stop_on_shared_port() -> Result<()> {
    let port = free_port()?;
    let registry = Arc::new(EndpointRegistry::new());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let f = frontend(&format!("worker-{i}"), &[local_prefix(port, &format!("/w{i}/"))]);
                let mut started = 0;
                for _ in 0..25 {
                    if registry.register_frontend(&f).is_ok() {
                        started += 1;
                        registry.unregister_frontend(f.as_ref());
                    }
                }
                started
            })
        })
        .collect();

    let mut total = 0;
    for w in workers {
        total += w.join().expect("worker panicked");
    }

    assert_eq!(total, 8 * 25);
    assert!(registry.is_empty());
    assert!(!port_in_use(port));
    Ok(())
}

#[test]
fn contended_prefix_has_one_owner_at_a_time() -> Result<()> {
    let port = free_port()?;
    let registry = Arc::new(EndpointRegistry::new());
    let prefix = local_prefix(port, "/contended/");

    let workers: Vec<_> = (0..6)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let own_path = format!("/own{i}/");
            let prefix = prefix.clone();
            thread::spawn(move || {
                let f = frontend(&format!("c{i}"), &[local_prefix(port, &own_path), prefix]);
                for _ in 0..25 {
                    match registry.register_frontend(&f) {
                        Ok(()) => {
                            let owner = registry.route(LOOPBACK, port, "127.0.0.1", "/contended/");
                            assert_eq!(owner.map(|o| o.id()), Some(f.id()));
                            registry.unregister_frontend(f.as_ref());
                        }
                        Err(_) => {
                            // a rolled-back batch leaves none of its prefixes behind
                            let own_route = registry.route(LOOPBACK, port, "127.0.0.1", &own_path);
                            assert!(own_route.map_or(true, |o| o.id() != f.id()));
                        }
                    }
                }
            })
        })
        .collect();

    for w in workers {
        w.join().expect("worker panicked");
    }

    assert!(registry.is_empty());
    Ok(())
}
