use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::auth::extractors::CurrentUser;
use crate::auth::oauth::OAuthError;
use crate::auth::session::extract_session_token;
use crate::errors::AppError;
use crate::models::user::User;
use crate::security::{hash_password, verify_password};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "Password must be 8 to 100 characters long."))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters long."))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthSessionRequest {
    pub session_id: Option<String>,
}

fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/register
///
/// Email uniqueness is a pre-check, not a transaction.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Length rules apply to the name as stored.
    request.name = request.name.trim().to_string();
    validate(&request)?;
    let email = normalize_email(&request.email);

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Validation("Email already registered".to_string()));
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let user = User::new(&email, &request.name, "", Some(password_hash));
    state.store.insert_user(&user).await.map_err(|e| {
        error!(user_id = %user.user_id, "Registration error: {e}");
        e
    })?;

    let issued = state.sessions.create_session(&user.user_id).await?;
    info!(user_id = %user.user_id, "New user registered");

    Ok(([(header::SET_COOKIE, issued.cookie)], Json(user)))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&request)?;
    let email = normalize_email(&request.email);

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state.store.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    let stored_hash = user
        .password_hash
        .clone()
        .ok_or_else(|| AppError::Unauthorized("Please login with Google".to_string()))?;

    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    if !verified {
        return Err(invalid());
    }

    let issued = state.sessions.create_session(&user.user_id).await?;
    info!(user_id = %user.user_id, "User logged in");

    Ok(([(header::SET_COOKIE, issued.cookie)], Json(user)))
}

/// POST /api/auth/session
///
/// Exchanges an OAuth `session_id` for a local session. Existing accounts
/// (matched by email) get their name and picture refreshed.
pub async fn handle_oauth_session(
    State(state): State<AppState>,
    Json(request): Json<OAuthSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("session_id required".to_string()))?;

    let profile = state.identity.exchange(&session_id).await.map_err(|e| match e {
        OAuthError::Rejected(_) => AppError::Unauthorized("Invalid session_id".to_string()),
        OAuthError::Http(_) => AppError::Upstream("OAuth service unavailable".to_string()),
    })?;

    let email = normalize_email(&profile.email);
    let picture = profile.picture.unwrap_or_default();

    let user_id = match state.store.find_user_by_email(&email).await? {
        Some(existing) => {
            state
                .store
                .update_user_profile(&existing.user_id, &profile.name, &picture)
                .await?;
            existing.user_id
        }
        None => {
            let user = User::new(&email, &profile.name, &picture, None);
            state.store.insert_user(&user).await?;
            info!(user_id = %user.user_id, "New OAuth user created");
            user.user_id
        }
    };

    let issued = state.sessions.create_session(&user_id).await?;
    let user = state
        .store
        .find_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user {user_id} vanished after upsert")))?;

    Ok(([(header::SET_COOKIE, issued.cookie)], Json(user)))
}

/// GET /api/auth/me
pub async fn handle_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// POST /api/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_session_token(&headers);
    let cleared = state.sessions.destroy_session(token.as_deref()).await?;
    Ok((
        [(header::SET_COOKIE, cleared)],
        Json::<Value>(json!({ "message": "Logged out" })),
    ))
}
