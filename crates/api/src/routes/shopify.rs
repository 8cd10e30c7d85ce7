//! Shopify order webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router, middleware};
use serde_json::{Value, json};

use empire_common::error::AppError;
use empire_common::types::OutboundMessage;
use empire_engine::fraud;
use empire_engine::orders::{OrderService, RecordOutcome, ShopifyOrder, alert_text};

use crate::middleware::shopify::verify_shopify;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/shopify/webhook", post(order_webhook))
        .route_layer(middleware::from_fn_with_state(state, verify_shopify))
}

/// POST /shopify/webhook: score and record an order, then queue an alert
/// for the admin chat. Redelivered orders are acknowledged without an alert.
async fn order_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;
    let order = ShopifyOrder::from_json(&payload)?;
    let score = fraud::score(&order);

    let row = match OrderService::record(&state.pool, &order, score).await? {
        RecordOutcome::Processed(row) => row,
        RecordOutcome::Duplicate => {
            return Ok(Json(json!({
                "status": "duplicate",
                "order_id": order.order_id,
            })));
        }
    };

    match &state.config.admin_chat_id {
        Some(chat_id) => {
            let message = OutboundMessage::new(chat_id.clone(), alert_text(row.amount, score));
            if let Err(e) = state.queue.enqueue(&state.config.default_bot, message) {
                tracing::warn!(error = %e, order_id = %row.order_id, "Order alert not queued");
            }
        }
        None => {
            tracing::warn!(order_id = %row.order_id, "ADMIN_CHAT_ID not set, skipping order alert");
        }
    }

    Ok(Json(json!({
        "status": "processed",
        "order_id": row.order_id,
        "fraud_score": score,
    })))
}
