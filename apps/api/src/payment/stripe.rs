//! Stripe Checkout over its REST API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::payment::{
    CheckoutRequest, CheckoutSession, CheckoutStatus, PaymentError, PaymentProvider, WebhookEvent,
};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const PRODUCT_NAME: &str = "Smart Resume Builder Premium";
/// Maximum age of a signed webhook, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

pub struct StripeProvider {
    client: Client,
    api_key: String,
    webhook_secret: Option<String>,
}

impl StripeProvider {
    pub fn new(client: Client, api_key: String, webhook_secret: Option<String>) -> Self {
        Self {
            client,
            api_key,
            webhook_secret,
        }
    }

    async fn parse_session(response: reqwest::Response) -> Result<SessionResponse, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Stripe API returned {}: {}", status, message);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let unit_amount = (request.amount * 100.0).round() as i64;
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            PRODUCT_NAME.to_string(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
    );
    form
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// `HMAC-SHA256(secret, "<t>.<payload>")`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature("missing timestamp"))?;
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance"));
    }

    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| PaymentError::InvalidSignature("unusable signing secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(PaymentError::InvalidSignature("no matching v1 signature"))
}

fn decode_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: EventEnvelope = serde_json::from_slice(payload)?;
    debug!(event_type = %event.event_type, "Stripe webhook received");
    let object = event.data.object;
    Ok(WebhookEvent {
        session_id: object.id,
        payment_status: object.payment_status.unwrap_or_else(|| "unpaid".to_string()),
        metadata: object.metadata,
    })
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_URL}/checkout/sessions"))
            .bearer_auth(&self.api_key)
            .form(&checkout_form(request))
            .send()
            .await?;

        let session = Self::parse_session(response).await?;
        Ok(CheckoutSession {
            url: session.url.unwrap_or_default(),
            session_id: session.id,
        })
    }

    async fn get_checkout_status(&self, session_id: &str) -> Result<CheckoutStatus, PaymentError> {
        let response = self
            .client
            .get(format!("{STRIPE_API_URL}/checkout/sessions/{session_id}"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let session = Self::parse_session(response).await?;
        Ok(CheckoutStatus {
            status: session.status.unwrap_or_else(|| "open".to_string()),
            payment_status: session.payment_status.unwrap_or_else(|| "unpaid".to_string()),
            amount_total: session.amount_total.unwrap_or(0),
            currency: session.currency.unwrap_or_default(),
        })
    }

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError> {
        match &self.webhook_secret {
            Some(secret) => {
                let header =
                    signature.ok_or(PaymentError::InvalidSignature("missing Stripe-Signature"))?;
                verify_signature(payload, header, secret, chrono::Utc::now().timestamp())?;
            }
            None => debug!("No webhook signing secret configured, skipping verification"),
        }
        decode_event(payload)
    }
}
