//! /route handler — which front-end would serve a request.

use std::net::IpAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use portmux_services::Frontend;

use super::{api_error, ApiError, ApiState};

#[derive(Deserialize)]
pub struct RouteQuery {
    pub address: IpAddr,
    pub port: u16,
    pub host: String,
    #[serde(default = "root_path")]
    pub path: String,
}

fn root_path() -> String {
    "/".to_string()
}

#[derive(Serialize)]
pub struct RouteResponse {
    pub frontend: String,
    pub frontend_id: u64,
}

pub async fn handle_route(
    State(state): State<ApiState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteResponse>, ApiError> {
    let frontend = state
        .registry
        .route(query.address, query.port, &query.host, &query.path)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!(
                    "no frontend for {}{} at {}:{}",
                    query.host, query.path, query.address, query.port
                ),
            )
        })?;

    Ok(Json(RouteResponse {
        frontend: frontend.name().to_string(),
        frontend_id: frontend.id().get(),
    }))
}
