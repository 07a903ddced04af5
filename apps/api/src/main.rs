mod ai;
mod auth;
mod config;
mod cv;
mod db;
mod errors;
mod llm_client;
mod models;
mod payment;
mod pdf;
mod rate_limit;
mod routes;
mod security;
mod share;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::oauth::{HttpIdentityProvider, IdentityProvider};
use crate::config::{Config, RateLimitBackend};
use crate::db::connect_store;
use crate::llm_client::LlmClient;
use crate::payment::{DevPaymentProvider, PaymentProvider, StripeProvider};
use crate::pdf::{BasicPdfRenderer, HttpPdfRenderer, PdfRenderer};
use crate::rate_limit::{CounterStore, MemoryCounters, RateLimiter, RedisCounters};
use crate::routes::build_router;
use crate::state::AppState;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    init_logging(&config);
    info!("Starting CV Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Record store (Postgres, or in-memory for `memory://`)
    let store = connect_store(&config.database_url).await?;

    // One HTTP client shared by every outbound integration
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let llm = LlmClient::new(http.clone(), config.anthropic_api_key.clone());
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("ANTHROPIC_API_KEY not set; AI endpoints will answer 500");
    }

    let payments: Arc<dyn PaymentProvider> = match &config.stripe_api_key {
        Some(key) => {
            info!("Payment provider: Stripe");
            Arc::new(StripeProvider::new(
                http.clone(),
                key.clone(),
                config.stripe_webhook_secret.clone(),
            ))
        }
        None => {
            warn!("STRIPE_API_KEY not set; using development payment provider");
            Arc::new(DevPaymentProvider)
        }
    };

    let pdf: Arc<dyn PdfRenderer> = match &config.pdf_renderer_url {
        Some(url) => {
            info!("PDF renderer: {url}");
            Arc::new(HttpPdfRenderer::new(http.clone(), url.clone()))
        }
        None => {
            info!("PDF renderer: built-in text renderer");
            Arc::new(BasicPdfRenderer)
        }
    };

    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
        http.clone(),
        config.oauth_session_url.clone(),
    ));

    let counters: Arc<dyn CounterStore> = match config.rate_limit_backend {
        RateLimitBackend::Memory => Arc::new(MemoryCounters::new()),
        RateLimitBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("RATE_LIMIT_BACKEND=redis requires REDIS_URL")?;
            let counters = RedisCounters::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            info!("Rate limit counters in Redis");
            Arc::new(counters)
        }
    };
    let limiter = Arc::new(RateLimiter::new(
        counters,
        config.rate_limit_per_minute,
        config.rate_limit_ai_per_minute,
    ));
    info!(
        "Rate limits: {}/min general, {}/min AI",
        config.rate_limit_per_minute, config.rate_limit_ai_per_minute
    );

    let cors = cors_layer(&config)?;
    let port = config.port;
    let state = AppState::new(config, store, identity, Arc::new(llm), payments, pdf);

    let app = build_router(state, limiter)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// `RUST_LOG` wins when it parses as a filter directive; `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={},tower_http=info",
            env!("CARGO_PKG_NAME"),
            &config.rust_log
        ))
    });
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Credentialed CORS for the configured origins only.
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}
