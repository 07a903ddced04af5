use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::IntoResponse,
};
use tracing::{error, info};

use crate::auth::extractors::CurrentUser;
use crate::errors::AppError;
use crate::pdf::html::{pdf_filename, render_cv_html};
use crate::state::AppState;

/// POST /api/generate-pdf/:id
///
/// Free accounts get a watermark.
pub async fn handle_generate_pdf(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cv_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let cv = state
        .store
        .find_cv(&cv_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("CV not found".to_string()))?;

    let html = render_cv_html(&cv, user.is_pro);
    let bytes = state.pdf.render(&html).await.map_err(|e| {
        error!(user_id = %user.user_id, cv_id = %cv_id, "PDF generation error: {e}");
        AppError::Pdf(e.to_string())
    })?;
    info!(user_id = %user.user_id, cv_id = %cv_id, size = bytes.len(), "PDF generated");

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        pdf_filename(&cv.title)
    ))
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
