pub mod admin;
pub mod alerts;
pub mod bot;
pub mod health;
pub mod shopify;

use axum::{Router, middleware};

use crate::rate_limit::enforce_default_limits;
use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(admin::router())
        .merge(shopify::router(state.clone()))
        .merge(bot::router())
        .merge(alerts::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_default_limits,
        ))
        .with_state(state)
}
