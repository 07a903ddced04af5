//! Subscription checkout.
//!
//! Handlers talk to a `PaymentProvider`: Stripe when an API key is
//! configured, a fixed-response development provider otherwise. Both the
//! status poll and the webhook funnel into `apply_paid_transition`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{Store, StoreResult};

pub mod dev;
pub mod handlers;
pub mod stripe;

pub use dev::DevPaymentProvider;
pub use stripe::StripeProvider;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(&'static str),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Major currency units, e.g. 4.99.
    pub amount: f64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutStatus {
    pub status: String,
    pub payment_status: String,
    /// Minor currency units as reported by the provider.
    pub amount_total: i64,
    pub currency: String,
}

impl CheckoutStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub session_id: String,
    pub payment_status: String,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn get_checkout_status(&self, session_id: &str) -> Result<CheckoutStatus, PaymentError>;

    /// Verifies and decodes a raw webhook body.
    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Marks the checkout's pending transaction paid and grants the owner a
/// subscription of `duration_days` from `now`. A transaction that is unknown
/// or already paid is left alone, so repeated polls and webhook retries
/// grant nothing extra. Returns whether a transition happened.
pub async fn apply_paid_transition(
    store: &dyn Store,
    session_id: &str,
    duration_days: i64,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let Some(txn) = store.find_transaction(session_id).await? else {
        warn!(session_id = %session_id, "Paid checkout has no transaction record");
        return Ok(false);
    };
    if txn.is_paid() {
        return Ok(false);
    }
    if !store.mark_transaction_paid(session_id, now).await? {
        return Ok(false);
    }

    let subscription_end = now + Duration::days(duration_days);
    store
        .set_subscription(&txn.user_id, true, Some(subscription_end))
        .await?;
    info!(user_id = %txn.user_id, session_id = %session_id, "User upgraded to pro");

    Ok(true)
}
