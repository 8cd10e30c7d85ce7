//! EmpireBot API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use empire_common::config::AppConfig;
use empire_common::db::{create_pool, run_migrations};
use empire_common::redis_pool::connect_optional;
use empire_notifier::AlertDispatcher;

use empire_api::middleware::shopify::MAX_WEBHOOK_BODY;
use empire_api::rate_limit::RateLimiter;
use empire_api::routes::create_router;
use empire_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("empire_api=debug,empire_engine=debug,empire_notifier=debug,tower_http=info")
        }))
        .init();

    tracing::info!("Starting EmpireBot API server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    if config.shopify_api_secret.is_none() {
        tracing::warn!("SHOPIFY_API_SECRET not set, webhooks will be refused");
    }
    if config.admin_user.is_none() || config.admin_pw_sha256.is_none() {
        tracing::warn!("Admin credentials not set, admin login is disabled");
    }

    // Database
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    // Rate limiting falls back to process memory without Redis
    let redis = connect_optional(config.redis_url.as_deref()).await;
    let limiter = RateLimiter::from_redis(redis);
    tracing::info!(backend = limiter.backend_name(), "Rate limiter ready");

    let dispatcher = AlertDispatcher::from_config(&config)?;
    tracing::info!(bots = ?dispatcher.bot_names(), "Alert dispatcher ready");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(pool, config, dispatcher, limiter);
    let queue = state.queue.clone();

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_BODY))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!(pending = queue.pending(), "Draining dispatch queue");
    queue.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
