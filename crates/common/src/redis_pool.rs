use redis::Client;
use redis::aio::ConnectionManager;

/// Connect to Redis and verify the server answers `PING`.
pub async fn connect_redis(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;
    let _: String = redis::cmd("PING").query_async(&mut manager).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}

/// Connect to Redis when a URL is configured, falling back to `None` on failure.
///
/// Callers that can run without Redis (the rate limiter) use this so a
/// missing or unreachable server degrades to in-process state.
pub async fn connect_optional(redis_url: Option<&str>) -> Option<ConnectionManager> {
    let url = redis_url?;
    match connect_redis(url).await {
        Ok(manager) => Some(manager),
        Err(e) => {
            tracing::error!(error = %e, "Redis unavailable, falling back to in-memory state");
            None
        }
    }
}
