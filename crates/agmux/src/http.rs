// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin REST wrappers over the core. Handlers validate, delegate, and map
//! failures onto the error taxonomy; no session logic lives here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::hub::auth::auth_layer;
use crate::hub::state::AppState;
use crate::hub::ws::ws_handler;
use crate::pty::PtySummary;
use crate::registry::restore::RestoreRequest;
use crate::runtime::{RuntimeStatus, StartRequest};
use crate::store::AgentSessionRecord;

/// Preference keys the surface will read or write.
const PREFERENCE_KEYS: &[&str] = &["launch", "settings", "taskProvider"];

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/v1/health", get(health))
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/v1/sessions/{id}",
            get(session_status).delete(delete_session),
        )
        .route("/api/v1/sessions/{id}/attach", post(attach_session))
        .route("/api/v1/agent-sessions", get(list_agent_sessions))
        .route("/api/v1/agent-sessions/restore", post(restore_agent_session))
        .route(
            "/api/v1/preferences/{key}",
            get(get_preference).put(put_preference),
        )
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_layer,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<PtySummary>> {
    Json(state.session_list(query.limit))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<PtySummary>, ApiError> {
    if req.command.is_empty() && req.tmux_session().is_none() {
        return Err(ApiError::bad_request("command is required"));
    }
    let summary = state
        .runtime
        .start(req)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    persist(&state, &summary);
    Ok(Json(summary))
}

async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.manager.summary(&id).is_none() {
        return Err(ApiError::not_found(format!("unknown session: {id}")));
    }
    let runtime: RuntimeStatus = state.runtime.status(&id).await;
    let readiness = state.readiness.status(&id);
    Ok(Json(serde_json::json!({
        "runtime": runtime,
        "readiness": readiness,
    })))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let killed = state.runtime.stop(&id).await;
    let forgotten = state
        .store
        .delete_session(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !killed && !forgotten {
        return Err(ApiError::not_found(format!("unknown session: {id}")));
    }
    state.manager.remove(&id);
    state.broadcast_pty_list();
    Ok(Json(serde_json::json!({ "killed": killed })))
}

async fn attach_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PtySummary>, ApiError> {
    let summary = state
        .runtime
        .attach(&id)
        .await
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    persist(&state, &summary);
    Ok(Json(summary))
}

async fn list_agent_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AgentSessionRecord>>, ApiError> {
    let sessions = state
        .registry
        .list_agent_sessions()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(sessions))
}

async fn restore_agent_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<PtySummary>, ApiError> {
    let context = crate::registry::restore::RestoreContext {
        registry: Arc::clone(&state.registry),
        manager: Arc::clone(&state.manager),
        readiness: Arc::clone(&state.readiness),
        tmux: state.tmux.clone(),
    };
    let summary = context.restore(req).await?;
    persist(&state, &summary);
    Ok(Json(summary))
}

async fn get_preference(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_known_key(&key)?;
    let value = state
        .store
        .get_preference(&key)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("no preference: {key}")))?;
    Ok(Json(value))
}

async fn put_preference(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_known_key(&key)?;
    state
        .store
        .set_preference(&key, &value)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

fn require_known_key(key: &str) -> Result<(), ApiError> {
    if PREFERENCE_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("unknown preference key: {key}")))
    }
}

fn persist(state: &AppState, summary: &PtySummary) {
    if let Err(e) = state.store.upsert_session(summary) {
        tracing::warn!("failed to persist session {}: {e:#}", summary.id);
    }
    state.broadcast_pty_list();
}
