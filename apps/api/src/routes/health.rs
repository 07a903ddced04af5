use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /api
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Smart Resume Builder API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health
/// Exempt from rate limiting.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.config.environment,
    }))
}
