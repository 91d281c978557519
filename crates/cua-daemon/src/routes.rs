//! Axum router and HTTP handlers for cua-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, so tests can use the bare router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    api_types::{DispatchResponse, HealthResponse},
    director::DispatchOutcome,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/scan", post(scan))
        .route("/v1/messages", post(messages))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.director.status().await))
}

// ---------------------------------------------------------------------------
// POST /v1/scan
// ---------------------------------------------------------------------------

/// Operator-triggered SCAN request, routed like any inbound message.
pub(crate) async fn scan(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    info!("scan requested over http");
    let outcome = st.director.dispatch(&json!({ "MSG_TYPE": "SCAN" })).await;
    dispatch_response(outcome)
}

// ---------------------------------------------------------------------------
// POST /v1/messages
// ---------------------------------------------------------------------------

/// Transport ingress: any inbound wire message.
pub(crate) async fn messages(
    State(st): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let outcome = st.director.dispatch(&body).await;
    dispatch_response(outcome)
}

fn dispatch_response(outcome: DispatchOutcome) -> (StatusCode, Json<DispatchResponse>) {
    let (code, body) = match outcome {
        DispatchOutcome::Handled { tag } => (
            StatusCode::OK,
            DispatchResponse {
                outcome: "handled".to_string(),
                tag: Some(tag),
                detail: None,
            },
        ),
        DispatchOutcome::Dropped { reason } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            DispatchResponse {
                outcome: "dropped".to_string(),
                tag: None,
                detail: Some(reason),
            },
        ),
        DispatchOutcome::Failed { tag, error } => (
            StatusCode::BAD_GATEWAY,
            DispatchResponse {
                outcome: "failed".to_string(),
                tag: Some(tag),
                detail: Some(error),
            },
        ),
    };
    (code, Json(body))
}
