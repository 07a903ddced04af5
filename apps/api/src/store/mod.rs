//! Record store adapter: typed accessors for every collection the API owns.
//!
//! Handlers only see `Arc<dyn Store>`. `PgStore` is the production backend;
//! `MemoryStore` backs tests and `DATABASE_URL=memory://` for local work.
//!
//! No operation here spans a transaction: multi-step flows (check email then
//! insert, read transaction then mark paid) tolerate the race between steps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::cv::Cv;
use crate::models::payment::PaymentTransaction;
use crate::models::session::Session;
use crate::models::share::ShareLink;
use crate::models::user::User;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Upper bound on CVs returned by a single list call.
pub const MAX_CVS_PER_LIST: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ── users ──────────────────────────────────────────────────────────────
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user_profile(&self, user_id: &str, name: &str, picture: &str)
        -> StoreResult<()>;
    async fn set_subscription(
        &self,
        user_id: &str,
        is_pro: bool,
        subscription_end: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    // ── sessions ───────────────────────────────────────────────────────────
    async fn insert_session(&self, session: &Session) -> StoreResult<()>;
    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>>;
    async fn delete_session(&self, token: &str) -> StoreResult<bool>;
    async fn delete_sessions_for_user(&self, user_id: &str) -> StoreResult<u64>;

    // ── cvs ────────────────────────────────────────────────────────────────
    /// Most recently updated first, capped at `MAX_CVS_PER_LIST`.
    async fn list_cvs(&self, user_id: &str) -> StoreResult<Vec<Cv>>;
    async fn insert_cv(&self, cv: &Cv) -> StoreResult<()>;
    /// Owner-scoped lookup: `None` when absent or owned by someone else.
    async fn find_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<Option<Cv>>;
    async fn find_cv_by_id(&self, cv_id: &str) -> StoreResult<Option<Cv>>;
    /// Persists title, data, settings and `updated_at`. False when no owned row matched.
    async fn update_cv(&self, cv: &Cv) -> StoreResult<bool>;
    async fn delete_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<bool>;

    // ── share links ────────────────────────────────────────────────────────
    /// Inserts or fully replaces the link keyed by `link.cv_id`.
    async fn upsert_share_link(&self, link: &ShareLink) -> StoreResult<()>;
    async fn find_active_share_for_cv(
        &self,
        cv_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<ShareLink>>;
    async fn find_active_share_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>>;
    /// False when the owner has no link for this CV.
    async fn deactivate_share_link(&self, cv_id: &str, user_id: &str) -> StoreResult<bool>;
    /// Atomic increment; returns the new count, or `None` if the token is unknown.
    async fn increment_share_views(&self, token: &str) -> StoreResult<Option<i64>>;

    // ── payment transactions ───────────────────────────────────────────────
    async fn insert_transaction(&self, txn: &PaymentTransaction) -> StoreResult<()>;
    async fn find_transaction(&self, session_id: &str) -> StoreResult<Option<PaymentTransaction>>;
    /// Moves a pending transaction to paid. False when it is unknown or was
    /// already paid.
    async fn mark_transaction_paid(&self, session_id: &str, at: DateTime<Utc>)
        -> StoreResult<bool>;
}
