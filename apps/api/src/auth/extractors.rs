use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// The authenticated user behind the request. Rejects with 401 when the
/// session is missing, unknown, expired or dangling.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state.sessions.resolve_current_user(&parts.headers).await?;
        Ok(CurrentUser(user))
    }
}
