//! Test alerts and bot reachability.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use empire_common::error::AppError;
use empire_common::types::OutboundMessage;
use empire_notifier::DispatchReport;

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub const TEST_ALERT_TEXT: &str = "🔥 Test Alert from EmpireBot";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts/test", post(test_alert))
        .route("/alerts/status", get(status))
}

/// POST /alerts/test: dispatch synchronously so the caller sees which bot
/// delivered and why the others failed.
async fn test_alert(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<DispatchReport>, AppError> {
    let chat_id = state
        .config
        .admin_chat_id
        .clone()
        .ok_or_else(|| AppError::Config("ADMIN_CHAT_ID is not configured".to_string()))?;

    let message = OutboundMessage::new(chat_id, TEST_ALERT_TEXT).html();
    let report = state.dispatcher.dispatch(&message).await;

    if !report.delivered {
        tracing::error!(
            errors = %report.error_summary().unwrap_or_default(),
            "Test alert failed on every bot"
        );
    }
    Ok(Json(report))
}

/// GET /alerts/status
async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "telegram": state.dispatcher.bot_status().await }))
}
