//! Server-side sessions: opaque tokens stored with an expiry, carried by the
//! `session_token` cookie or an `Authorization: Bearer` header.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::session::Session;
use crate::models::user::User;
use crate::security::generate_secure_token;
use crate::store::Store;

pub const SESSION_COOKIE: &str = "session_token";
const SESSION_TOKEN_PREFIX: &str = "st";

/// A freshly created session plus the `Set-Cookie` value that carries it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub cookie: HeaderValue,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    expire_days: i64,
    production: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, expire_days: i64, production: bool) -> Self {
        Self {
            store,
            expire_days,
            production,
        }
    }

    /// Replaces every existing session of `user_id` with a new one.
    pub async fn create_session(&self, user_id: &str) -> Result<IssuedSession, AppError> {
        let now = Utc::now();
        let session = Session {
            session_token: generate_secure_token(SESSION_TOKEN_PREFIX),
            user_id: user_id.to_string(),
            expires_at: now + Duration::days(self.expire_days),
            created_at: now,
        };

        let removed = self.store.delete_sessions_for_user(user_id).await?;
        self.store.insert_session(&session).await?;
        debug!(user_id = %user_id, superseded = removed, "session created");

        let cookie = self.session_cookie(&session.session_token)?;
        Ok(IssuedSession {
            token: session.session_token,
            cookie,
        })
    }

    /// Resolves the request's session to its user.
    pub async fn resolve_current_user(&self, headers: &HeaderMap) -> Result<User, AppError> {
        let token = extract_session_token(headers)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let session = self
            .store
            .find_session(&token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid session".to_string()))?;

        if session.is_expired(Utc::now()) {
            return Err(AppError::Unauthorized("Session expired".to_string()));
        }

        self.store
            .find_user_by_id(&session.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %session.user_id, "session points to a missing user");
                AppError::Unauthorized("User not found".to_string())
            })
    }

    /// Deletes the session if one is given and returns a clearing cookie.
    /// Unknown or absent tokens are not an error.
    pub async fn destroy_session(&self, token: Option<&str>) -> Result<HeaderValue, AppError> {
        if let Some(token) = token {
            if self.store.delete_session(token).await? {
                info!("User logged out");
            }
        }
        self.clear_cookie()
    }

    fn session_cookie(&self, token: &str) -> Result<HeaderValue, AppError> {
        let max_age = Duration::days(self.expire_days).num_seconds();
        let value = format!(
            "{SESSION_COOKIE}={token}; Max-Age={max_age}; Path=/; HttpOnly; {}",
            self.cookie_policy()
        );
        HeaderValue::from_str(&value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie value: {e}")))
    }

    fn clear_cookie(&self) -> Result<HeaderValue, AppError> {
        let value = format!(
            "{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; {}",
            self.cookie_policy()
        );
        HeaderValue::from_str(&value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie value: {e}")))
    }

    fn cookie_policy(&self) -> &'static str {
        if self.production {
            "SameSite=None; Secure"
        } else {
            "SameSite=Lax"
        }
    }
}

/// Reads a named cookie from every `Cookie` header on the request.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Session token from the cookie, falling back to a bearer header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}
