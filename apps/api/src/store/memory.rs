use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::cv::Cv;
use crate::models::payment::{PaymentTransaction, PAYMENT_PAID};
use crate::models::session::Session;
use crate::models::share::ShareLink;
use crate::models::user::User;
use crate::store::{Store, StoreResult, MAX_CVS_PER_LIST};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,              // user_id -> user
    sessions: HashMap<String, Session>,        // session_token -> session
    cvs: HashMap<String, Cv>,                  // cv_id -> cv
    share_links: HashMap<String, ShareLink>,   // cv_id -> link
    transactions: HashMap<String, PaymentTransaction>, // session_id -> txn
}

/// In-process store. Used by tests and for running the API without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn user_count(&self) -> usize {
        self.data.lock().await.users.len()
    }

    #[cfg(test)]
    pub async fn session_count_for(&self, user_id: &str) -> usize {
        self.data
            .lock()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.data.lock().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.data.lock().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        data.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: &str,
    ) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        if let Some(user) = data.users.get_mut(user_id) {
            user.name = name.to_string();
            user.picture = picture.to_string();
        }
        Ok(())
    }

    async fn set_subscription(
        &self,
        user_id: &str,
        is_pro: bool,
        subscription_end: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        if let Some(user) = data.users.get_mut(user_id) {
            user.is_pro = is_pro;
            user.subscription_end = subscription_end;
        }
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        data.sessions
            .insert(session.session_token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(self.data.lock().await.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        Ok(self.data.lock().await.sessions.remove(token).is_some())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> StoreResult<u64> {
        let mut data = self.data.lock().await;
        let before = data.sessions.len();
        data.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - data.sessions.len()) as u64)
    }

    async fn list_cvs(&self, user_id: &str) -> StoreResult<Vec<Cv>> {
        let data = self.data.lock().await;
        let mut cvs: Vec<Cv> = data
            .cvs
            .values()
            .filter(|cv| cv.user_id == user_id)
            .cloned()
            .collect();
        cvs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        cvs.truncate(MAX_CVS_PER_LIST as usize);
        Ok(cvs)
    }

    async fn insert_cv(&self, cv: &Cv) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        data.cvs.insert(cv.cv_id.clone(), cv.clone());
        Ok(())
    }

    async fn find_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<Option<Cv>> {
        let data = self.data.lock().await;
        Ok(data
            .cvs
            .get(cv_id)
            .filter(|cv| cv.user_id == user_id)
            .cloned())
    }

    async fn find_cv_by_id(&self, cv_id: &str) -> StoreResult<Option<Cv>> {
        Ok(self.data.lock().await.cvs.get(cv_id).cloned())
    }

    async fn update_cv(&self, cv: &Cv) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        match data.cvs.get_mut(&cv.cv_id) {
            Some(existing) if existing.user_id == cv.user_id => {
                existing.title = cv.title.clone();
                existing.data = cv.data.clone();
                existing.settings = cv.settings.clone();
                existing.updated_at = cv.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_cv(&self, cv_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        let owned = data
            .cvs
            .get(cv_id)
            .is_some_and(|cv| cv.user_id == user_id);
        if owned {
            data.cvs.remove(cv_id);
        }
        Ok(owned)
    }

    async fn upsert_share_link(&self, link: &ShareLink) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        data.share_links.insert(link.cv_id.clone(), link.clone());
        Ok(())
    }

    async fn find_active_share_for_cv(
        &self,
        cv_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<ShareLink>> {
        let data = self.data.lock().await;
        Ok(data
            .share_links
            .get(cv_id)
            .filter(|l| l.user_id == user_id && l.is_active)
            .cloned())
    }

    async fn find_active_share_by_token(&self, token: &str) -> StoreResult<Option<ShareLink>> {
        let data = self.data.lock().await;
        Ok(data
            .share_links
            .values()
            .find(|l| l.share_token == token && l.is_active)
            .cloned())
    }

    async fn deactivate_share_link(&self, cv_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        match data.share_links.get_mut(cv_id) {
            Some(link) if link.user_id == user_id => {
                link.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_share_views(&self, token: &str) -> StoreResult<Option<i64>> {
        let mut data = self.data.lock().await;
        Ok(data
            .share_links
            .values_mut()
            .find(|l| l.share_token == token)
            .map(|link| {
                link.views += 1;
                link.views
            }))
    }

    async fn insert_transaction(&self, txn: &PaymentTransaction) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        data.transactions
            .insert(txn.session_id.clone(), txn.clone());
        Ok(())
    }

    async fn find_transaction(&self, session_id: &str) -> StoreResult<Option<PaymentTransaction>> {
        Ok(self.data.lock().await.transactions.get(session_id).cloned())
    }

    async fn mark_transaction_paid(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        Ok(match data.transactions.get_mut(session_id) {
            Some(txn) if !txn.is_paid() => {
                txn.payment_status = PAYMENT_PAID.to_string();
                txn.updated_at = Some(at);
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_link(cv_id: &str, token: &str) -> ShareLink {
        let now = Utc::now();
        ShareLink {
            cv_id: cv_id.to_string(),
            user_id: "user_a".to_string(),
            share_token: token.to_string(),
            expires_at: now + Duration::days(30),
            views: 0,
            is_active: true,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_cv_is_owner_scoped() {
        let store = MemoryStore::new();
        let cv = Cv::new("user_a", None);
        store.insert_cv(&cv).await.unwrap();

        assert!(store.find_cv(&cv.cv_id, "user_a").await.unwrap().is_some());
        assert!(store.find_cv(&cv.cv_id, "user_b").await.unwrap().is_none());
        assert!(!store.delete_cv(&cv.cv_id, "user_b").await.unwrap());
        assert!(store.delete_cv(&cv.cv_id, "user_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_token_for_same_cv() {
        let store = MemoryStore::new();
        store.upsert_share_link(&make_link("cv_1", "share_old")).await.unwrap();
        store.upsert_share_link(&make_link("cv_1", "share_new")).await.unwrap();

        assert!(store.find_active_share_by_token("share_old").await.unwrap().is_none());
        assert!(store.find_active_share_by_token("share_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment_views_returns_new_count() {
        let store = MemoryStore::new();
        store.upsert_share_link(&make_link("cv_1", "share_x")).await.unwrap();

        assert_eq!(store.increment_share_views("share_x").await.unwrap(), Some(1));
        assert_eq!(store.increment_share_views("share_x").await.unwrap(), Some(2));
        assert_eq!(store.increment_share_views("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deactivated_link_is_hidden() {
        let store = MemoryStore::new();
        store.upsert_share_link(&make_link("cv_1", "share_x")).await.unwrap();
        assert!(store.deactivate_share_link("cv_1", "user_a").await.unwrap());
        assert!(store.find_active_share_by_token("share_x").await.unwrap().is_none());
        assert!(!store.deactivate_share_link("cv_1", "user_b").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        let mut older = Cv::new("user_a", Some("older".into()));
        older.updated_at = Utc::now() - Duration::hours(1);
        let newer = Cv::new("user_a", Some("newer".into()));
        store.insert_cv(&older).await.unwrap();
        store.insert_cv(&newer).await.unwrap();
        store.insert_cv(&Cv::new("user_b", None)).await.unwrap();

        let titles: Vec<_> = store
            .list_cvs("user_a")
            .await
            .unwrap()
            .into_iter()
            .map(|cv| cv.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }
}
