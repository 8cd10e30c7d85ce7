//! Queue a Telegram message through a named bot.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use empire_common::error::AppError;
use empire_common::types::OutboundMessage;
use empire_notifier::QueueError;

use crate::middleware::auth::AdminUser;
use crate::middleware::json::JsonBody;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/bot/send", post(send))
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    bot: Option<String>,
    /// Telegram accepts numeric ids and `@channel` names.
    chat_id: Option<Value>,
    text: String,
    parse_mode: Option<String>,
}

fn chat_id(value: Option<Value>, fallback: Option<&str>) -> Result<String, AppError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        None | Some(Value::Null) => fallback
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("chat_id is required".to_string())),
        Some(_) => Err(AppError::Validation(
            "chat_id must be a string or number".to_string(),
        )),
    }
}

/// POST /bot/send
async fn send(
    State(state): State<AppState>,
    admin: AdminUser,
    JsonBody(body): JsonBody<SendRequest>,
) -> Result<Json<Value>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }

    let bot = body
        .bot
        .map(|b| b.trim().to_lowercase())
        .unwrap_or_else(|| state.config.default_bot.clone());
    let chat_id = chat_id(body.chat_id, state.config.admin_chat_id.as_deref())?;

    let mut message = OutboundMessage::new(chat_id, body.text);
    message.parse_mode = body.parse_mode;

    let id = state.queue.enqueue(&bot, message).map_err(|e| match e {
        QueueError::UnknownBot(_) => AppError::Validation(e.to_string()),
        QueueError::Closed => AppError::Internal(e.to_string()),
    })?;

    tracing::info!(delivery_id = %id, bot = %bot, admin = %admin.username, "Message accepted");

    Ok(Json(json!({
        "status": "sent",
        "bot": bot,
        "delivery_id": id,
    })))
}
