//! HTTP trigger surface.
//!
//!   POST /trigger-monitor[?mock=true] → run one pass, JSON RunReport
//!   GET  /health                      → "OK"
//!   GET  /api/state                   → persisted alert state (read-only)

use crate::monitor::{Monitor, RunGate};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for the routes.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub gate: RunGate,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerParams {
    #[serde(default)]
    pub mock: bool,
}

/// Build the Axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/trigger-monitor", post(trigger_monitor))
        .route("/health", get(health))
        .route("/api/state", get(api_state))
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "trigger server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn trigger_monitor(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> impl IntoResponse {
    let Some(_permit) = state.gate.try_enter() else {
        warn!("trigger rejected, a monitoring run is already in progress");
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "monitoring run already in progress"})),
        )
            .into_response();
    };

    info!(mock = params.mock, "monitoring run triggered");
    match state.monitor.run(params.mock, Utc::now()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "monitoring run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn api_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.monitor.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!(error = %e, "failed to load state snapshot");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
