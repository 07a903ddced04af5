use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::models::cv::{Cv, CvData, CvSettings};
use crate::models::payment::{PaymentTransaction, PAYMENT_PAID};
use crate::models::session::Session;
use crate::models::share::ShareLink;
use crate::models::user::User;
use crate::store::{Store, StoreResult, MAX_CVS_PER_LIST};

/// PostgreSQL-backed store. CV documents live in JSONB columns.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CvRow {
    cv_id: String,
    user_id: String,
    title: String,
    data: Json<CvData>,
    settings: Json<CvSettings>,
    is_pro: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CvRow> for Cv {
    fn from(row: CvRow) -> Self {
        Cv {
            cv_id: row.cv_id,
            user_id: row.user_id,
            title: row.title,
            data: row.data.0,
            settings: row.settings.0,
            is_pro: row.is_pro,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, email, name, picture, password_hash, is_pro, subscription_end, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.picture)
        .bind(&user.password_hash)
        .bind(user.is_pro)
        .bind(user.subscription_end)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: &str,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET name = $1, picture = $2 WHERE user_id = $3")
            .bind(name)
            .bind(picture)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_subscription(
        &self,
        user_id: &str,
        is_pro: bool,
        subscription_end: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET is_pro = $1, subscription_end = $2 WHERE user_id = $3")
            .bind(is_pro)
            .bind(subscription_end)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO user_sessions (session_token, user_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.session_token)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions WHERE session_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE session_token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_cvs(&self, user_id: &str) -> StoreResult<Vec<Cv>> {
        let rows = sqlx::query_as::<_, CvRow>(
            "SELECT * FROM cvs WHERE user_id = $1 ORDER BY updated_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(MAX_CVS_PER_LIST)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Cv::from).collect())
    }

    async fn insert_cv(&self, cv: &Cv) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cvs
                (cv_id, user_id, title, data, settings, is_pro, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&cv.cv_id)
        .bind(&cv.user_id)
        .bind(&cv.title)
        .bind(Json(&cv.data))
        .bind(Json(&cv.settings))
        .bind(cv.is_pro)
        .bind(cv.created_at)
        .bind(cv.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<Option<Cv>> {
        let row = sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE cv_id = $1 AND user_id = $2")
            .bind(cv_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Cv::from))
    }

    async fn find_cv_by_id(&self, cv_id: &str) -> StoreResult<Option<Cv>> {
        let row = sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE cv_id = $1")
            .bind(cv_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Cv::from))
    }

    async fn update_cv(&self, cv: &Cv) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cvs
            SET title = $1, data = $2, settings = $3, updated_at = $4
            WHERE cv_id = $5 AND user_id = $6
            "#,
        )
        .bind(&cv.title)
        .bind(Json(&cv.data))
        .bind(Json(&cv.settings))
        .bind(cv.updated_at)
        .bind(&cv.cv_id)
        .bind(&cv.user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cvs WHERE cv_id = $1 AND user_id = $2")
            .bind(cv_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_share_link(&self, link: &ShareLink) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO share_links
                (cv_id, user_id, share_token, expires_at, views, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (cv_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                share_token = EXCLUDED.share_token,
                expires_at = EXCLUDED.expires_at,
                views = EXCLUDED.views,
                is_active = EXCLUDED.is_active,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&link.cv_id)
        .bind(&link.user_id)
        .bind(&link.share_token)
        .bind(link.expires_at)
        .bind(link.views)
        .bind(link.is_active)
        .bind(link.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_share_for_cv(
        &self,
        cv_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<ShareLink>> {
        Ok(sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE cv_id = $1 AND user_id = $2 AND is_active",
        )
        .bind(cv_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_active_share_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>> {
        Ok(sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE share_token = $1 AND is_active",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn deactivate_share_link(&self, cv_id: &str, user_id: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE share_links SET is_active = FALSE WHERE cv_id = $1 AND user_id = $2")
                .bind(cv_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_share_views(&self, token: &str) -> StoreResult<Option<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "UPDATE share_links SET views = views + 1 WHERE share_token = $1 RETURNING views",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_transaction(&self, txn: &PaymentTransaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (transaction_id, session_id, user_id, email, amount, currency,
                 payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&txn.transaction_id)
        .bind(&txn.session_id)
        .bind(&txn.user_id)
        .bind(&txn.email)
        .bind(txn.amount)
        .bind(&txn.currency)
        .bind(&txn.payment_status)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_transaction(&self, session_id: &str) -> StoreResult<Option<PaymentTransaction>> {
        Ok(sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_transaction_paid(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET payment_status = $1, updated_at = $2 \
             WHERE session_id = $3 AND payment_status <> $1",
        )
        .bind(PAYMENT_PAID)
        .bind(at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
