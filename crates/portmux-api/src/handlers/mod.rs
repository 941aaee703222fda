//! HTTP API handlers — exposes registry state as JSON.

pub mod frontends;
pub mod route;
pub mod status;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use portmux_core::ListenerError;
use portmux_services::{EndpointRegistry, FrontendTable};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<EndpointRegistry>,
    /// Front-ends currently started, keyed on name.
    pub frontends: FrontendTable,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a registration failure onto an HTTP status.
fn listener_error(e: ListenerError) -> ApiError {
    let status = match e {
        ListenerError::PrefixCollision(_) | ListenerError::Bind { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, e.to_string())
}

/// Run a registry mutation off the async workers. Registration resolves
/// host names and binds sockets, and holds a front-end table guard while it
/// does.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
}

fn unknown_frontend(name: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("unknown frontend: {name}"))
}

// Re-export handler functions for use in router setup.
pub use frontends::{
    handle_frontend_list, handle_frontend_start, handle_frontend_stop, handle_prefix_add,
    handle_prefix_remove,
};
pub use route::handle_route;
pub use status::{handle_endpoints, handle_shutdown, handle_status};
