//! Shared application state for the Axum API server.

use std::sync::Arc;

use empire_common::config::AppConfig;
use empire_notifier::{AlertDispatcher, DeliveryRecorder, DispatchQueue};
use sqlx::SqlitePool;

use crate::rate_limit::RateLimiter;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub queue: Arc<DispatchQueue>,
    pub deliveries: DeliveryRecorder,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Build the state and start the dispatch worker. Must run inside a tokio runtime.
    pub fn new(
        pool: SqlitePool,
        config: AppConfig,
        dispatcher: AlertDispatcher,
        limiter: RateLimiter,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let deliveries = DeliveryRecorder::new(pool.clone());
        let queue = DispatchQueue::start(dispatcher.clone(), Some(deliveries.clone()));

        Self {
            pool,
            config: Arc::new(config),
            dispatcher,
            queue: Arc::new(queue),
            deliveries,
            limiter,
        }
    }
}
