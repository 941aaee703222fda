//! portmuxd — shared-endpoint registry daemon.
//!
//! Starts the front-ends listed in the config file, serves the admin API,
//! and unregisters everything on shutdown.

use std::sync::Arc;

use anyhow::Result;

use portmux_core::config::PortmuxConfig;
use portmux_services::{new_frontend_table, EndpointRegistry, Frontend, FrontendTable, HttpFrontend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = PortmuxConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PortmuxConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PortmuxConfig::default()
    });
    tracing::info!(
        path = %PortmuxConfig::file_path().display(),
        frontends = config.frontends.len(),
        "portmuxd starting"
    );

    // Shared state
    let registry = Arc::new(EndpointRegistry::new());
    let frontends = new_frontend_table();

    start_configured(&registry, &frontends, &config);
    tracing::info!(
        endpoints = registry.len(),
        frontends = frontends.len(),
        "configured frontends started"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    let api_task = if config.api.enabled {
        let state = portmux_api::ApiState {
            registry: registry.clone(),
            frontends: frontends.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let port = config.api.port;
        Some(tokio::spawn(async move {
            if let Err(e) = portmux_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        }))
    } else {
        tracing::info!("admin API disabled");
        None
    };

    let _ = shutdown_rx.recv().await;

    if let Some(task) = api_task {
        let _ = task.await;
    }

    stop_all(&registry, &frontends);
    tracing::info!("portmuxd stopped");
    Ok(())
}

/// Register every configured front-end. A front-end that fails is logged and
/// skipped; the others still start.
fn start_configured(registry: &EndpointRegistry, frontends: &FrontendTable, config: &PortmuxConfig) {
    for frontend_config in &config.frontends {
        if frontends.contains_key(&frontend_config.name) {
            tracing::warn!(frontend = %frontend_config.name, "duplicate frontend name, skipping");
            continue;
        }

        let frontend = Arc::new(HttpFrontend::from_config(frontend_config));
        let handle: Arc<dyn Frontend> = frontend.clone();
        match registry.register_frontend(&handle) {
            Ok(()) => {
                frontends.insert(frontend_config.name.clone(), frontend);
            }
            Err(e) => {
                tracing::warn!(
                    frontend = %frontend_config.name,
                    error = %e,
                    "failed to start frontend"
                );
            }
        }
    }
}

fn stop_all(registry: &EndpointRegistry, frontends: &FrontendTable) {
    let names: Vec<String> = frontends.iter().map(|e| e.key().clone()).collect();
    for name in names {
        if let Some((_, frontend)) = frontends.remove(&name) {
            registry.unregister_frontend(frontend.as_ref());
        }
    }
    if !registry.is_empty() {
        tracing::warn!(endpoints = registry.len(), "endpoints left after shutdown");
    }
}
