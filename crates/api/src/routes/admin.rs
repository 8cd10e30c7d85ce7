//! Admin login and read-only views of the order and delivery logs.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use empire_common::error::AppError;
use empire_common::types::{Delivery, DeliveryStatus, Order};
use empire_engine::orders::OrderService;

use crate::middleware::auth::{AdminUser, encode_jwt, verify_admin};
use crate::middleware::client_ip::ClientIp;
use crate::middleware::json::JsonBody;
use crate::rate_limit::LOGIN_LIMIT;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/orders", get(list_orders))
        .route("/admin/deliveries", get(list_deliveries))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// POST /admin/login: exchange admin credentials for a JWT.
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    if !state.limiter.check(&format!("login:{}", ip), &[LOGIN_LIMIT]).await {
        tracing::warn!(client = %ip, "Login rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    if !verify_admin(&state.config, &body.username, &body.password) {
        tracing::warn!(client = %ip, username = %body.username, "Admin login failed");
        return Err(AppError::Auth("Invalid credentials".to_string()));
    }

    let token = encode_jwt(
        &body.username,
        &state.config.jwt_secret,
        state.config.jwt_expiry_minutes,
        true,
    )?;

    tracing::info!(username = %body.username, "Admin logged in");

    Ok(Json(json!({
        "token": token,
        "expires_in": state.config.jwt_expiry_minutes * 60,
    })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// GET /admin/orders
async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::list_recent(&state.pool, query.limit()).await?;
    Ok(Json(orders))
}

/// GET /admin/deliveries?status=failed: the failed rows are the dead letters.
async fn list_deliveries(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DeliveryStatus>)
        .transpose()
        .map_err(|_| AppError::Validation("status must be 'sent' or 'failed'".to_string()))?;

    let deliveries = state.deliveries.list(status, query.limit()).await?;
    Ok(Json(deliveries))
}
