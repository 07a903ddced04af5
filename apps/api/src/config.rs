use anyhow::{Context, Result};

/// Backend used by the rate limiter to hold request timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Redis,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub environment: String,
    pub port: u16,
    pub rust_log: String,
    pub cors_origins: Vec<String>,
    pub session_expire_days: i64,
    pub share_link_days: i64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_ai_per_minute: u32,
    pub rate_limit_backend: RateLimitBackend,
    pub redis_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub stripe_api_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub oauth_session_url: String,
    pub pdf_renderer_url: Option<String>,
    pub subscription_price: f64,
    pub subscription_currency: String,
    pub subscription_duration_days: i64,
}

const DEFAULT_OAUTH_SESSION_URL: &str =
    "https://demobackend.emergentagent.com/auth/v1/env/oauth/session-data";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let rate_limit_backend = match optional_env("RATE_LIMIT_BACKEND").as_deref() {
            None | Some("memory") => RateLimitBackend::Memory,
            Some("redis") => RateLimitBackend::Redis,
            Some(other) => anyhow::bail!("RATE_LIMIT_BACKEND must be 'memory' or 'redis', got '{other}'"),
        };
        let redis_url = optional_env("REDIS_URL");
        if rate_limit_backend == RateLimitBackend::Redis && redis_url.is_none() {
            anyhow::bail!("RATE_LIMIT_BACKEND=redis requires REDIS_URL");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            environment: optional_env("ENV").unwrap_or_else(|| "development".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cors_origins: optional_env("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
            session_expire_days: parse_env("SESSION_EXPIRE_DAYS", 7)?,
            share_link_days: parse_env("SHARE_LINK_DAYS", 30)?,
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 60)?,
            rate_limit_ai_per_minute: parse_env("RATE_LIMIT_AI_PER_MINUTE", 10)?,
            rate_limit_backend,
            redis_url,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            stripe_api_key: optional_env("STRIPE_API_KEY"),
            stripe_webhook_secret: optional_env("STRIPE_WEBHOOK_SECRET"),
            oauth_session_url: optional_env("OAUTH_SESSION_URL")
                .unwrap_or_else(|| DEFAULT_OAUTH_SESSION_URL.to_string()),
            pdf_renderer_url: optional_env("PDF_RENDERER_URL"),
            subscription_price: parse_env("SUBSCRIPTION_PRICE", 4.99)?,
            subscription_currency: optional_env("SUBSCRIPTION_CURRENCY")
                .unwrap_or_else(|| "usd".to_string()),
            subscription_duration_days: parse_env("SUBSCRIPTION_DURATION_DAYS", 30)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration used by in-process tests: memory store, dev providers.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "memory://".to_string(),
            environment: "development".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            session_expire_days: 7,
            share_link_days: 30,
            rate_limit_per_minute: 60,
            rate_limit_ai_per_minute: 10,
            rate_limit_backend: RateLimitBackend::Memory,
            redis_url: None,
            anthropic_api_key: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            oauth_session_url: DEFAULT_OAUTH_SESSION_URL.to_string(),
            pdf_renderer_url: None,
            subscription_price: 4.99,
            subscription_currency: "usd".to_string(),
            subscription_duration_days: 30,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        None => Ok(default),
    }
}
