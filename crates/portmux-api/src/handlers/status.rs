//! /status, /endpoints, /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use portmux_services::EndpointSummary;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub endpoints: usize,
    pub frontends: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        endpoints: state.registry.len(),
        frontends: state.frontends.len(),
    })
}

// ── /endpoints ───────────────────────────────────────────────────────────────

pub async fn handle_endpoints(State(state): State<ApiState>) -> Json<Vec<EndpointSummary>> {
    Json(state.registry.endpoints())
}

// ── /daemon/shutdown ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub shutting_down: bool,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse {
        shutting_down: true,
    })
}
