pub mod handlers;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Build the admin router. Everything lives under `/api`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/endpoints", get(handlers::handle_endpoints))
        .route(
            "/frontends",
            get(handlers::handle_frontend_list).post(handlers::handle_frontend_start),
        )
        .route("/frontends/{name}", delete(handlers::handle_frontend_stop))
        .route(
            "/frontends/{name}/prefixes",
            post(handlers::handle_prefix_add),
        )
        .route(
            "/frontends/{name}/prefixes/remove",
            post(handlers::handle_prefix_remove),
        )
        .route("/route", get(handlers::handle_route))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let mut shutdown = state.shutdown_tx.subscribe();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
