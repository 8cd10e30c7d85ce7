//! Status and health endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health_check))
}

/// Worker liveness, rate-limit backend and per-bot queue depths.
async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "rate_limiting": state.limiter.backend_name(),
        "bot_thread": state.queue.is_running(),
        "message_queues": state.queue.depths(),
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "empire-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
