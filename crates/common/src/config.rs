use crate::types::BotToken;

/// Bot names that can be configured through `{NAME}_BOT_TOKEN` variables.
pub const KNOWN_BOTS: [&str; 5] = ["empire", "zariah", "keycontrol", "chatgpt", "deepseek"];

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string
    pub database_url: String,

    /// Maximum number of SQLite connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Redis connection string; selects the Redis rate-limit backend when set
    pub redis_url: Option<String>,

    /// HTTP listen port (default: 5000)
    pub port: u16,

    /// JWT secret for admin tokens
    pub jwt_secret: String,

    /// Admin JWT lifetime in minutes (default: 15)
    pub jwt_expiry_minutes: u64,

    /// Admin username
    pub admin_user: Option<String>,

    /// Hex-encoded SHA-256 digest of the admin password
    pub admin_pw_sha256: Option<String>,

    /// Shopify app secret used to sign webhooks
    pub shopify_api_secret: Option<String>,

    /// Maximum accepted skew of the webhook timestamp header, in seconds
    pub shopify_webhook_tolerance_secs: u64,

    /// Default Telegram chat that receives alerts
    pub admin_chat_id: Option<String>,

    /// Configured bot tokens, in `KNOWN_BOTS` order
    pub bots: Vec<BotToken>,

    /// Order in which the dispatcher tries bots
    pub failover_order: Vec<String>,

    /// Bot used for order alerts and `/bot/send` requests without a bot
    pub default_bot: String,

    /// Telegram Bot API base URL
    pub telegram_api_base: String,

    /// Attempts per bot before moving to the next one
    pub alert_max_retries: u32,

    /// Per-request timeout in seconds
    pub alert_timeout_secs: u64,

    /// Backoff base in milliseconds; the n-th retry waits base * 2^n
    pub alert_backoff_base_ms: u64,

    /// Consecutive failures after which a bot is demoted to the end of the order
    pub alert_failure_threshold: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, generating a per-process secret");
                format!(
                    "{}{}",
                    uuid::Uuid::new_v4().simple(),
                    uuid::Uuid::new_v4().simple()
                )
            }
        };

        let bots = KNOWN_BOTS
            .iter()
            .filter_map(|name| {
                get(&format!("{}_BOT_TOKEN", name.to_uppercase())).map(|token| BotToken {
                    name: name.to_string(),
                    token,
                })
            })
            .collect();

        let failover_order = get("ALERT_FAILOVER_ORDER")
            .unwrap_or_else(|| "empire,zariah,keycontrol".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://empirebot.db".to_string()),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            redis_url: get("REDIS_URL"),
            port: parse_or(&get, "PORT", 5000)?,
            jwt_secret,
            jwt_expiry_minutes: parse_or(&get, "JWT_EXPIRY_MINUTES", 15)?,
            admin_user: get("ADMIN_USER"),
            admin_pw_sha256: get("ADMIN_PW_SHA256").map(|h| h.to_lowercase()),
            shopify_api_secret: get("SHOPIFY_API_SECRET"),
            shopify_webhook_tolerance_secs: parse_or(&get, "SHOPIFY_WEBHOOK_TOLERANCE_SECS", 300)?,
            admin_chat_id: get("ADMIN_CHAT_ID"),
            bots,
            failover_order,
            default_bot: get("DEFAULT_BOT")
                .map(|b| b.to_lowercase())
                .unwrap_or_else(|| "empire".to_string()),
            telegram_api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string())
                .trim_end_matches('/')
                .to_string(),
            alert_max_retries: parse_or(&get, "ALERT_MAX_RETRIES", 3)?,
            alert_timeout_secs: parse_or(&get, "ALERT_TIMEOUT_SECS", 5)?,
            alert_backoff_base_ms: parse_or(&get, "ALERT_BACKOFF_BASE_MS", 1000)?,
            alert_failure_threshold: parse_or(&get, "ALERT_FAILURE_THRESHOLD", 3)?,
        })
    }

    /// Look up a configured bot token by name.
    pub fn bot(&self, name: &str) -> Option<&BotToken> {
        self.bots.iter().find(|b| b.name == name)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        None => Ok(default),
    }
}
