//! Axum route handlers for the AI features.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::ai::{
    analyze_cv, improve_section, optimize_for_job, suggest_skills, AiOutcome, CvAnalysis,
    ImprovedText, JobMatch, SkillSuggestions,
};
use crate::auth::extractors::CurrentUser;
use crate::errors::AppError;
use crate::llm_client::LlmError;
use crate::models::cv::CvData;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub cv_data: CvData,
}

#[derive(Debug, Deserialize)]
pub struct ImproveRequest {
    pub section: String,
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobOptimizeRequest {
    pub cv_data: CvData,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestSkillsRequest {
    #[serde(default)]
    pub job_title: String,
}

fn into_app_error(e: LlmError) -> AppError {
    match e {
        LlmError::NotConfigured => AppError::NotConfigured("AI service not configured".to_string()),
        other => AppError::Internal(other.into()),
    }
}

fn finish<T>(outcome: AiOutcome<T>, feature: &str, user_id: &str) -> Json<T> {
    info!(user_id = %user_id, feature, outcome = outcome.label(), "AI request served");
    Json(outcome.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<CvAnalysis>, AppError> {
    let outcome = analyze_cv(state.llm.as_ref(), &request.cv_data)
        .await
        .map_err(into_app_error)?;
    Ok(finish(outcome, "analyze", &user.user_id))
}

/// POST /api/ai/improve
pub async fn handle_improve(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ImproveRequest>,
) -> Result<Json<ImprovedText>, AppError> {
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }

    let outcome = improve_section(
        state.llm.as_ref(),
        &request.section,
        &request.content,
        request.context.as_deref(),
    )
    .await
    .map_err(into_app_error)?;
    Ok(finish(outcome, "improve", &user.user_id))
}

/// POST /api/ai/optimize-for-job
pub async fn handle_optimize_for_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<JobOptimizeRequest>,
) -> Result<Json<JobMatch>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("job_description cannot be empty".to_string()));
    }

    let outcome = optimize_for_job(state.llm.as_ref(), &request.cv_data, &request.job_description)
        .await
        .map_err(into_app_error)?;
    Ok(finish(outcome, "optimize-for-job", &user.user_id))
}

/// POST /api/ai/suggest-skills
pub async fn handle_suggest_skills(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SuggestSkillsRequest>,
) -> Result<Json<SkillSuggestions>, AppError> {
    let outcome = suggest_skills(state.llm.as_ref(), request.job_title.trim())
        .await
        .map_err(into_app_error)?;
    Ok(finish(outcome, "suggest-skills", &user.user_id))
}
