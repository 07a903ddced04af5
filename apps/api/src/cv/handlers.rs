use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::extractors::CurrentUser;
use crate::errors::AppError;
use crate::models::cv::{Cv, CvCreate, CvUpdate};
use crate::state::AppState;

fn cv_not_found() -> AppError {
    AppError::NotFound("CV not found".to_string())
}

/// GET /api/cvs
///
/// At most 100 CVs, most recently updated first.
pub async fn handle_list_cvs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Cv>>, AppError> {
    let cvs = state.store.list_cvs(&user.user_id).await.map_err(|e| {
        error!(user_id = %user.user_id, "Get CVs error: {e}");
        e
    })?;
    Ok(Json(cvs))
}

/// POST /api/cvs
///
/// The body is optional; a missing or blank title becomes "Untitled CV".
pub async fn handle_create_cv(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Option<Json<CvCreate>>,
) -> Result<(StatusCode, Json<Cv>), AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let cv = Cv::new(&user.user_id, request.title);

    state.store.insert_cv(&cv).await.map_err(|e| {
        error!(user_id = %user.user_id, "Create CV error: {e}");
        e
    })?;
    info!(user_id = %user.user_id, cv_id = %cv.cv_id, "CV created");

    Ok((StatusCode::CREATED, Json(cv)))
}

/// GET /api/cvs/:id
pub async fn handle_get_cv(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<Json<Cv>, AppError> {
    let cv = state
        .store
        .find_cv(&cv_id, &user.user_id)
        .await?
        .ok_or_else(cv_not_found)?;
    Ok(Json(cv))
}

/// PUT /api/cvs/:id
///
/// Top-level partial update: omitted fields keep their stored value.
pub async fn handle_update_cv(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
    Json(update): Json<CvUpdate>,
) -> Result<Json<Cv>, AppError> {
    let mut cv = state
        .store
        .find_cv(&cv_id, &user.user_id)
        .await?
        .ok_or_else(cv_not_found)?;

    update.apply_to(&mut cv, Utc::now());

    if !state.store.update_cv(&cv).await? {
        return Err(cv_not_found());
    }
    info!(user_id = %user.user_id, cv_id = %cv.cv_id, "CV updated");

    Ok(Json(cv))
}

/// DELETE /api/cvs/:id
pub async fn handle_delete_cv(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_cv(&cv_id, &user.user_id).await? {
        return Err(cv_not_found());
    }
    info!(user_id = %user.user_id, cv_id = %cv_id, "CV deleted");

    Ok(Json(json!({ "message": "CV deleted" })))
}
