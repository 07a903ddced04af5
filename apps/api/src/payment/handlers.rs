use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::extractors::CurrentUser;
use crate::errors::AppError;
use crate::models::payment::PaymentTransaction;
use crate::payment::{apply_paid_transition, CheckoutRequest, CheckoutStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub origin_url: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub url: String,
    pub session_id: String,
}

/// POST /api/stripe/create-checkout
pub async fn handle_create_checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, AppError> {
    let origin = request.origin_url.trim_end_matches('/');
    if origin.is_empty() {
        return Err(AppError::Validation("origin_url required".to_string()));
    }

    let config = &state.config;
    let checkout = CheckoutRequest {
        amount: config.subscription_price,
        currency: config.subscription_currency.clone(),
        success_url: format!("{origin}/payment-success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{origin}/dashboard"),
        metadata: BTreeMap::from([
            ("user_id".to_string(), user.user_id.clone()),
            ("email".to_string(), user.email.clone()),
            ("type".to_string(), "subscription".to_string()),
        ]),
    };

    let session = state
        .payments
        .create_checkout_session(&checkout)
        .await
        .map_err(|e| {
            error!(user_id = %user.user_id, "Create checkout error: {e}");
            AppError::Payment(e.to_string())
        })?;

    let txn = PaymentTransaction::pending(
        &session.session_id,
        &user.user_id,
        &user.email,
        config.subscription_price,
        &config.subscription_currency,
    );
    state.store.insert_transaction(&txn).await?;
    info!(user_id = %user.user_id, session_id = %session.session_id, "Checkout session created");

    Ok(Json(CreateCheckoutResponse {
        url: session.url,
        session_id: session.session_id,
    }))
}

/// GET /api/stripe/status/:session_id
///
/// Polls the provider; a paid checkout upgrades its owner once.
pub async fn handle_checkout_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<CheckoutStatus>, AppError> {
    let status = state
        .payments
        .get_checkout_status(&session_id)
        .await
        .map_err(|e| {
            error!(user_id = %user.user_id, session_id = %session_id, "Get checkout status error: {e}");
            AppError::Payment(e.to_string())
        })?;

    if status.is_paid() {
        apply_paid_transition(
            state.store.as_ref(),
            &session_id,
            state.config.subscription_duration_days,
            Utc::now(),
        )
        .await?;
    }

    Ok(Json(status))
}

/// POST /api/webhook/stripe
///
/// Always answers 200 so the provider does not retry on our own failures.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok());

    let event = match state.payments.handle_webhook(&body, signature).await {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook error: {e}");
            return Json(json!({ "status": "error", "message": e.to_string() }));
        }
    };

    if event.payment_status == "paid" {
        let result = apply_paid_transition(
            state.store.as_ref(),
            &event.session_id,
            state.config.subscription_duration_days,
            Utc::now(),
        )
        .await;

        match result {
            Ok(true) => info!(
                session_id = %event.session_id,
                user_id = event.metadata.get("user_id").map(String::as_str).unwrap_or(""),
                "Webhook processed"
            ),
            Ok(false) => {}
            Err(e) => {
                error!(session_id = %event.session_id, "Webhook error: {e}");
                return Json(json!({ "status": "error", "message": "Failed to record payment" }));
            }
        }
    }

    Json(json!({ "status": "ok" }))
}
