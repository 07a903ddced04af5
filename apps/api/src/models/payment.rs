use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_PAID: &str = "paid";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    /// Checkout session id issued by the payment provider.
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub amount: f64,
    pub currency: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentTransaction {
    pub fn pending(session_id: &str, user_id: &str, email: &str, amount: f64, currency: &str) -> Self {
        Self {
            transaction_id: format!("txn_{}", &Uuid::new_v4().simple().to_string()[..12]),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            amount,
            currency: currency.to_string(),
            payment_status: PAYMENT_PENDING.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PAYMENT_PAID
    }
}
