use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::payment::{
    CheckoutRequest, CheckoutSession, CheckoutStatus, PaymentError, PaymentProvider, WebhookEvent,
};

/// Checkout ids are `dev_session_<32 hex>`, unique per checkout.
pub const DEV_SESSION_PREFIX: &str = "dev_session";
pub const DEV_CHECKOUT_URL: &str = "https://example.com/checkout";

/// Fixed responses for running without a payment provider. Checkouts never
/// report as paid.
#[derive(Debug, Default, Clone)]
pub struct DevPaymentProvider;

#[async_trait]
impl PaymentProvider for DevPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session_id = format!("{DEV_SESSION_PREFIX}_{}", Uuid::new_v4().simple());
        debug!(session_id = %session_id, amount = request.amount, currency = %request.currency, "dev checkout session");
        Ok(CheckoutSession {
            session_id,
            url: DEV_CHECKOUT_URL.to_string(),
        })
    }

    async fn get_checkout_status(&self, _session_id: &str) -> Result<CheckoutStatus, PaymentError> {
        Ok(CheckoutStatus {
            status: "complete".to_string(),
            payment_status: "unpaid".to_string(),
            amount_total: 0,
            currency: "usd".to_string(),
        })
    }

    async fn handle_webhook(
        &self,
        _payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError> {
        Ok(WebhookEvent {
            session_id: DEV_SESSION_PREFIX.to_string(),
            payment_status: "unpaid".to_string(),
            metadata: Default::default(),
        })
    }
}
