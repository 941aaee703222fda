//! /frontends handlers — start and stop front-ends, add and remove prefixes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use portmux_core::FrontendConfig;
use portmux_services::{Frontend, HttpFrontend};

use super::{api_error, listener_error, run_blocking, unknown_frontend, ApiError, ApiState};

// ── /frontends (GET) ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct FrontendInfo {
    pub name: String,
    pub id: u64,
    pub prefixes: Vec<String>,
    pub reuse_address: bool,
}

fn info(frontend: &HttpFrontend) -> FrontendInfo {
    FrontendInfo {
        name: frontend.name().to_string(),
        id: frontend.id().get(),
        prefixes: frontend.prefixes(),
        reuse_address: frontend.reuse_address(),
    }
}

pub async fn handle_frontend_list(State(state): State<ApiState>) -> Json<Vec<FrontendInfo>> {
    let mut list: Vec<FrontendInfo> = state
        .frontends
        .iter()
        .map(|entry| info(entry.value()))
        .collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    Json(list)
}

// ── /frontends (POST) ────────────────────────────────────────────────────────

pub async fn handle_frontend_start(
    State(state): State<ApiState>,
    Json(config): Json<FrontendConfig>,
) -> Result<(StatusCode, Json<FrontendInfo>), ApiError> {
    if config.name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "frontend name is required"));
    }

    run_blocking(move || {
        // Holding the entry keeps a concurrent start with the same name out
        // until registration has settled.
        let started = match state.frontends.entry(config.name.clone()) {
            Entry::Occupied(_) => Err(api_error(
                StatusCode::CONFLICT,
                format!("frontend already exists: {}", config.name),
            )),
            Entry::Vacant(slot) => {
                let frontend = Arc::new(HttpFrontend::from_config(&config));
                let handle: Arc<dyn Frontend> = frontend.clone();
                state
                    .registry
                    .register_frontend(&handle)
                    .map_err(listener_error)?;
                let body = info(&frontend);
                slot.insert(frontend);
                tracing::info!(frontend = %config.name, "frontend started via API");
                Ok((StatusCode::CREATED, Json(body)))
            }
        };
        started
    })
    .await
}

// ── /frontends/{name} (DELETE) ───────────────────────────────────────────────

pub async fn handle_frontend_stop(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    run_blocking(move || {
        let (_, frontend) = state
            .frontends
            .remove(&name)
            .ok_or_else(|| unknown_frontend(&name))?;
        state.registry.unregister_frontend(frontend.as_ref());
        tracing::info!(frontend = %name, "frontend stopped via API");
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

// ── /frontends/{name}/prefixes ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PrefixRequest {
    pub prefix: String,
}

// Both prefix handlers keep the table guard until the registry and the
// front-end agree, so a concurrent stop cannot unregister in between.

pub async fn handle_prefix_add(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<PrefixRequest>,
) -> Result<Json<FrontendInfo>, ApiError> {
    run_blocking(move || {
        let entry = state
            .frontends
            .get(&name)
            .ok_or_else(|| unknown_frontend(&name))?;
        let frontend = entry.value();

        let handle: Arc<dyn Frontend> = frontend.clone();
        state
            .registry
            .add_prefix(&req.prefix, &handle)
            .map_err(listener_error)?;
        frontend.add_prefix(&req.prefix);

        Ok(Json(info(frontend)))
    })
    .await
}

pub async fn handle_prefix_remove(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<PrefixRequest>,
) -> Result<Json<FrontendInfo>, ApiError> {
    run_blocking(move || {
        let entry = state
            .frontends
            .get(&name)
            .ok_or_else(|| unknown_frontend(&name))?;
        let frontend = entry.value();

        if !frontend.contains_prefix(&req.prefix) {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                format!("{name} does not own {}", req.prefix),
            ));
        }

        state.registry.remove_prefix(&req.prefix, &**frontend);
        frontend.remove_prefix(&req.prefix);

        Ok(Json(info(frontend)))
    })
    .await
}
