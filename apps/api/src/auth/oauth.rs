//! OAuth session exchange: trades a one-time `session_id` from the identity
//! service for the user's profile.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("identity service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity service rejected session id (status {0})")]
    Rejected(u16),
}

/// Profile returned by the identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange(&self, session_id: &str) -> Result<OAuthProfile, OAuthError>;
}

/// Calls the external identity endpoint with an `X-Session-ID` header.
pub struct HttpIdentityProvider {
    client: Client,
    session_url: String,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, session_url: String) -> Self {
        Self {
            client,
            session_url,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange(&self, session_id: &str) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .client
            .get(&self.session_url)
            .header("X-Session-ID", session_id)
            .send()
            .await
            .map_err(|e| {
                error!("OAuth HTTP error: {e}");
                OAuthError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "identity service rejected session id");
            return Err(OAuthError::Rejected(status.as_u16()));
        }

        Ok(response.json::<OAuthProfile>().await?)
    }
}
