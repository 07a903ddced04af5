use std::sync::Arc;

use crate::auth::oauth::IdentityProvider;
use crate::auth::session::SessionManager;
use crate::config::Config;
use crate::llm_client::CompletionClient;
use crate::payment::PaymentProvider;
use crate::pdf::PdfRenderer;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
/// External services sit behind traits so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionManager,
    pub identity: Arc<dyn IdentityProvider>,
    pub llm: Arc<dyn CompletionClient>,
    pub payments: Arc<dyn PaymentProvider>,
    pub pdf: Arc<dyn PdfRenderer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        llm: Arc<dyn CompletionClient>,
        payments: Arc<dyn PaymentProvider>,
        pdf: Arc<dyn PdfRenderer>,
    ) -> Self {
        let sessions = SessionManager::new(
            store.clone(),
            config.session_expire_days,
            config.is_production(),
        );
        Self {
            store,
            sessions,
            identity,
            llm,
            payments,
            pdf,
            config: Arc::new(config),
        }
    }

    /// In-memory state for tests: memory store, dev payments, basic PDF
    /// renderer, and an identity service that knows one session id
    /// (`oauth_ok`, for `carol@example.com`).
    #[cfg(test)]
    pub fn fake(store: Arc<dyn Store>, llm: Arc<dyn CompletionClient>) -> Self {
        use async_trait::async_trait;

        use crate::auth::oauth::{OAuthError, OAuthProfile};
        use crate::payment::DevPaymentProvider;
        use crate::pdf::BasicPdfRenderer;

        struct FakeIdentity;
        #[async_trait]
        impl IdentityProvider for FakeIdentity {
            async fn exchange(&self, session_id: &str) -> Result<OAuthProfile, OAuthError> {
                match session_id {
                    "oauth_ok" => Ok(OAuthProfile {
                        email: "Carol@Example.com".to_string(),
                        name: "Carol".to_string(),
                        picture: Some("https://img.example/carol.png".to_string()),
                    }),
                    _ => Err(OAuthError::Rejected(401)),
                }
            }
        }

        Self::new(
            Config::for_tests(),
            store,
            Arc::new(FakeIdentity),
            llm,
            Arc::new(DevPaymentProvider),
            Arc::new(BasicPdfRenderer),
        )
    }
}
