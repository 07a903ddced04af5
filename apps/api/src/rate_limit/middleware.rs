use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::auth::session::extract_session_token;
use crate::errors::AppError;
use crate::rate_limit::{Decision, RateLimiter};

/// Session token when the request carries one, otherwise the peer address.
fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(token) = extract_session_token(headers) {
        return format!("session_{token}");
    }
    match peer {
        Some(info) => format!("ip_{}", info.0.ip()),
        None => "ip_unknown".to_string(),
    }
}

/// Rejects over-limit requests with 429 before they reach a handler.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let key = client_key(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );

    match limiter.check(&key, &path).await {
        Decision::Allowed => {
            debug!(path = %path, "Request allowed by rate limiter");
            next.run(request).await
        }
        Decision::Limited(tier) => {
            warn!(path = %path, tier = ?tier, "Request blocked by rate limiter");
            AppError::RateLimited(tier.message().to_string()).into_response()
        }
    }
}
