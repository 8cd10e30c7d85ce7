//! Moving-window rate limiting.
//!
//! Every hit is timestamped; a request is allowed when, for each limit, fewer
//! than `max` hits fall inside the trailing window. Denied requests are not
//! counted. State lives in process memory, or in Redis sorted sets when a
//! Redis connection is available so that several API instances share it.
//! The Redis check runs as one Lua script and is atomic per client.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use redis::aio::ConnectionManager;

use empire_common::error::AppError;

use crate::middleware::client_ip::ClientIp;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max: u32,
    pub window: Duration,
}

impl Limit {
    pub const fn per_minute(max: u32) -> Self {
        Self {
            max,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(max: u32) -> Self {
        Self {
            max,
            window: Duration::from_secs(3600),
        }
    }
}

/// Limit for admin login attempts per client.
pub const LOGIN_LIMIT: Limit = Limit::per_minute(5);

const MEMORY_DEFAULT_LIMITS: [Limit; 2] = [Limit::per_hour(200), Limit::per_minute(20)];
const REDIS_DEFAULT_LIMITS: [Limit; 2] = [Limit::per_hour(500), Limit::per_minute(50)];

/// How often idle clients are swept from the in-memory store.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct MemoryStore {
    hits: HashMap<String, VecDeque<Instant>>,
    /// Longest window any check has used; older hits can never matter.
    max_window: Duration,
    last_sweep: Option<Instant>,
}

impl MemoryStore {
    /// Drop clients with no hit inside any window.
    fn sweep(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|t| now.saturating_duration_since(t) < SWEEP_INTERVAL)
        {
            return;
        }
        self.last_sweep = Some(now);
        let max_window = self.max_window;
        self.hits.retain(|_, q| {
            q.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < max_window)
        });
    }
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<Mutex<MemoryStore>>),
    Redis(ConnectionManager),
}

#[derive(Clone)]
pub struct RateLimiter {
    backend: Backend,
    default_limits: Vec<Limit>,
}

impl RateLimiter {
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(MemoryStore::default()))),
            default_limits: MEMORY_DEFAULT_LIMITS.to_vec(),
        }
    }

    pub fn redis(conn: ConnectionManager) -> Self {
        Self {
            backend: Backend::Redis(conn),
            default_limits: REDIS_DEFAULT_LIMITS.to_vec(),
        }
    }

    /// Redis when a connection is available, memory otherwise.
    pub fn from_redis(conn: Option<ConnectionManager>) -> Self {
        match conn {
            Some(conn) => Self::redis(conn),
            None => Self::memory(),
        }
    }

    pub fn with_default_limits(mut self, limits: Vec<Limit>) -> Self {
        self.default_limits = limits;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }

    pub fn default_limits(&self) -> &[Limit] {
        &self.default_limits
    }

    /// Record a hit for `key` if it stays within every limit. Returns whether
    /// the request is allowed.
    pub async fn check(&self, key: &str, limits: &[Limit]) -> bool {
        if limits.is_empty() {
            return true;
        }
        match &self.backend {
            Backend::Memory(hits) => check_memory(hits, key, limits, Instant::now()),
            Backend::Redis(conn) => match check_redis(conn.clone(), key, limits).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    tracing::warn!(error = %e, key, "Rate limiter unavailable, allowing request");
                    true
                }
            },
        }
    }
}

fn check_memory(store: &Mutex<MemoryStore>, key: &str, limits: &[Limit], now: Instant) -> bool {
    let longest = limits
        .iter()
        .map(|l| l.window)
        .max()
        .unwrap_or_default();

    let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
    store.max_window = store.max_window.max(longest);
    store.sweep(now);

    let entry = store.hits.entry(key.to_string()).or_default();

    while entry
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) >= longest)
    {
        entry.pop_front();
    }

    let allowed = limits.iter().all(|limit| {
        let in_window = entry
            .iter()
            .rev()
            .take_while(|t| now.saturating_duration_since(**t) < limit.window)
            .count();
        in_window < limit.max as usize
    });

    if allowed {
        entry.push_back(now);
    } else if entry.is_empty() {
        store.hits.remove(key);
    }
    allowed
}

/// Prune, count and record in one step so concurrent requests cannot all
/// pass on the same count.
///
/// KEYS: one sorted set per limit. ARGV: now (ms), member, then
/// `window_ms, max` for each limit.
const REDIS_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
for i, key in ipairs(KEYS) do
  local window = tonumber(ARGV[1 + 2 * i])
  local max = tonumber(ARGV[2 + 2 * i])
  redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
  if redis.call('ZCARD', key) >= max then
    return 0
  end
end
for i, key in ipairs(KEYS) do
  redis.call('ZADD', key, now, ARGV[2])
  redis.call('PEXPIRE', key, tonumber(ARGV[1 + 2 * i]))
end
return 1
"#;

static SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| redis::Script::new(REDIS_SCRIPT));

async fn check_redis(
    mut conn: ConnectionManager,
    key: &str,
    limits: &[Limit],
) -> redis::RedisResult<bool> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4().simple());

    let mut invocation = SCRIPT.prepare_invoke();
    for limit in limits {
        invocation.key(format!("ratelimit:{}:{}", key, limit.window.as_secs()));
    }
    invocation.arg(now_ms).arg(member);
    for limit in limits {
        invocation
            .arg(limit.window.as_millis() as u64)
            .arg(limit.max);
    }

    let allowed: i32 = invocation.invoke_async(&mut conn).await?;
    Ok(allowed == 1)
}

/// Apply the limiter's default limits to every request, keyed by client IP.
pub async fn enforce_default_limits(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("global:{}", ip);
    if !state.limiter.check(&key, state.limiter.default_limits()).await {
        tracing::warn!(client = %ip, path = %req.uri().path(), "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}
