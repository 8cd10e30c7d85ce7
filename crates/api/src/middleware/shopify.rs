//! Shopify webhook signature check.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use empire_common::error::AppError;
use empire_engine::shopify::{HMAC_HEADER, TIMESTAMP_HEADER, verify_webhook};

use crate::state::AppState;

/// Largest webhook body accepted.
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

/// Reject requests whose timestamp is stale or whose HMAC does not match the
/// raw body. The buffered body is handed on to the handler unchanged.
pub async fn verify_shopify(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secret = state
        .config
        .shopify_api_secret
        .clone()
        .ok_or_else(|| AppError::Config("SHOPIFY_API_SECRET is not configured".to_string()))?;

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_WEBHOOK_BODY)
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable webhook body: {}", e)))?;

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    let now = Utc::now().timestamp_millis() as f64 / 1000.0;

    if let Err(rejection) = verify_webhook(
        &secret,
        header(TIMESTAMP_HEADER),
        header(HMAC_HEADER),
        &bytes,
        now,
        state.config.shopify_webhook_tolerance_secs,
    ) {
        tracing::warn!(reason = %rejection, "Shopify webhook rejected");
        return Err(AppError::Forbidden(rejection.to_string()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
