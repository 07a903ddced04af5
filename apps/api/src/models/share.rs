use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public read access to one CV. Keyed by `cv_id`: re-sharing a CV replaces
/// the token rather than adding a second link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareLink {
    pub cv_id: String,
    pub user_id: String,
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
    pub views: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
