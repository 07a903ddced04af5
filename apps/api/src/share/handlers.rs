use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::extractors::CurrentUser;
use crate::errors::AppError;
use crate::models::cv::Cv;
use crate::models::share::ShareLink;
use crate::models::user::OwnerProfile;
use crate::security::generate_secure_token;
use crate::state::AppState;

const SHARE_TOKEN_LEN: usize = 24;

#[derive(Debug, Serialize)]
pub struct ShareLinkCreated {
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PublicCv {
    pub cv: Cv,
    pub owner: Option<OwnerProfile>,
    pub views: i64,
}

/// `share_` followed by random url-safe characters, 24 chars in total.
fn new_share_token() -> String {
    let mut token = generate_secure_token("share");
    token.truncate(SHARE_TOKEN_LEN);
    token
}

/// POST /api/cvs/:id/share
///
/// Re-sharing replaces the token and expiry and restarts the view count.
pub async fn handle_create_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<Json<ShareLinkCreated>, AppError> {
    if !user.is_pro {
        return Err(AppError::Forbidden("Premium subscription required".to_string()));
    }

    state
        .store
        .find_cv(&cv_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("CV not found".to_string()))?;

    let now = Utc::now();
    let link = ShareLink {
        cv_id: cv_id.clone(),
        user_id: user.user_id.clone(),
        share_token: new_share_token(),
        expires_at: now + Duration::days(state.config.share_link_days),
        views: 0,
        is_active: true,
        created_at: now,
    };
    state.store.upsert_share_link(&link).await?;
    info!(user_id = %user.user_id, cv_id = %cv_id, "Share link created");

    Ok(Json(ShareLinkCreated {
        share_token: link.share_token,
        expires_at: link.expires_at,
    }))
}

/// GET /api/cvs/:id/share
pub async fn handle_get_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let Some(link) = state
        .store
        .find_active_share_for_cv(&cv_id, &user.user_id)
        .await?
    else {
        return Ok(Json(json!({ "share_token": null })));
    };

    if link.is_expired(Utc::now()) {
        return Ok(Json(json!({ "share_token": null, "expired": true })));
    }

    Ok(Json(serde_json::to_value(link).map_err(anyhow::Error::from)?))
}

/// DELETE /api/cvs/:id/share
pub async fn handle_delete_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.store.deactivate_share_link(&cv_id, &user.user_id).await? {
        return Err(AppError::NotFound("Share link not found".to_string()));
    }
    info!(user_id = %user.user_id, cv_id = %cv_id, "Share link deleted");

    Ok(Json(json!({ "message": "Share link deleted" })))
}

/// GET /api/public/cv/:token
///
/// No authentication. Each successful fetch counts one view.
pub async fn handle_public_cv(
    State(state): State<AppState>,
    Path(share_token): Path<String>,
) -> Result<Json<PublicCv>, AppError> {
    let link = state
        .store
        .find_active_share_by_token(&share_token)
        .await?
        .ok_or_else(|| AppError::NotFound("CV not found or link expired".to_string()))?;

    if link.is_expired(Utc::now()) {
        return Err(AppError::NotFound("Share link expired".to_string()));
    }

    let cv = state
        .store
        .find_cv_by_id(&link.cv_id)
        .await?
        .ok_or_else(|| AppError::NotFound("CV not found".to_string()))?;

    let owner = state
        .store
        .find_user_by_id(&link.user_id)
        .await?
        .as_ref()
        .map(OwnerProfile::from);

    let views = state
        .store
        .increment_share_views(&share_token)
        .await?
        .unwrap_or(link.views + 1);
    info!(cv_id = %link.cv_id, views, "Public CV viewed");

    Ok(Json(PublicCv { cv, owner, views }))
}
