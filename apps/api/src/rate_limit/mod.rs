//! Sliding-window rate limiting.
//!
//! `RateLimiter` is built once at startup and handed to the middleware as
//! state. Request timestamps live in a `CounterStore`: in-process for a
//! single instance, Redis when several instances must share counts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

pub mod middleware;

pub const WINDOW: Duration = Duration::from_secs(60);
pub const AI_PATH_PREFIX: &str = "/api/ai/";
const EXEMPT_PATHS: &[&str] = &["/api/health", "/api"];

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Storage for per-key request timestamps.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Drops hits older than `window`, then records one more hit for `key`
    /// unless `limit` hits remain. Returns whether the hit was recorded.
    async fn try_acquire(&self, key: &str, limit: u32, window: Duration)
        -> Result<bool, RateLimitError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-process counters
// ────────────────────────────────────────────────────────────────────────────

/// Client keys are never evicted; each deque holds at most `limit` entries.
#[derive(Default)]
pub struct MemoryCounters {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounters {
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, RateLimitError> {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let entries = hits.entry(key.to_string()).or_default();

        while entries
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            entries.pop_front();
        }

        if entries.len() >= limit as usize {
            return Ok(false);
        }
        entries.push_back(now);
        Ok(true)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis counters
// ────────────────────────────────────────────────────────────────────────────

/// Prune, count and insert in one round trip so instances never interleave.
const SLIDING_WINDOW_LUA: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now - window)
if redis.call('ZCARD', KEYS[1]) >= tonumber(ARGV[3]) then
  return 0
end
redis.call('ZADD', KEYS[1], now, ARGV[4])
redis.call('PEXPIRE', KEYS[1], window)
return 1
"#;

pub struct RedisCounters {
    conn: MultiplexedConnection,
    script: Script,
}

impl RedisCounters {
    pub async fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            conn,
            script: Script::new(SLIDING_WINDOW_LUA),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounters {
    async fn try_acquire(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, RateLimitError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();
        let recorded: i32 = self
            .script
            .key(format!("ratelimit:{key}"))
            .arg(now_ms)
            .arg(window.as_millis() as i64)
            .arg(limit)
            .arg(format!("{now_ms}-{}", Uuid::new_v4().simple()))
            .invoke_async(&mut conn)
            .await?;
        Ok(recorded == 1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Limiter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    General,
    Ai,
}

impl Tier {
    pub fn message(self) -> &'static str {
        match self {
            Tier::General => "Rate limit exceeded. Please try again later.",
            Tier::Ai => "AI rate limit exceeded. Please try again later.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited(Tier),
}

pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    general_limit: u32,
    ai_limit: u32,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, general_limit: u32, ai_limit: u32) -> Self {
        Self {
            counters,
            general_limit,
            ai_limit,
        }
    }

    pub fn is_exempt(path: &str) -> bool {
        EXEMPT_PATHS.contains(&path)
    }

    /// AI requests must pass the AI window first; a request refused there is
    /// not charged to the general window. Counter store failures let the
    /// request through.
    pub async fn check(&self, client_key: &str, path: &str) -> Decision {
        if Self::is_exempt(path) {
            return Decision::Allowed;
        }

        if path.contains(AI_PATH_PREFIX)
            && !self
                .acquire(&format!("ai:{client_key}"), self.ai_limit)
                .await
        {
            return Decision::Limited(Tier::Ai);
        }

        if !self
            .acquire(&format!("general:{client_key}"), self.general_limit)
            .await
        {
            return Decision::Limited(Tier::General);
        }

        Decision::Allowed
    }

    async fn acquire(&self, key: &str, limit: u32) -> bool {
        match self.counters.try_acquire(key, limit, WINDOW).await {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!(error = %e, key = %key, "Error checking rate limit, allowing request");
                true
            }
        }
    }
}
