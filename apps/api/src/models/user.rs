use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account. `password_hash` is absent for accounts created
/// through the OAuth exchange and is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_pro: bool,
    pub subscription_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, name: &str, picture: &str, password_hash: Option<String>) -> Self {
        Self {
            user_id: new_user_id(),
            email: email.to_string(),
            name: name.to_string(),
            picture: picture.to_string(),
            password_hash,
            is_pro: false,
            subscription_end: None,
            created_at: Utc::now(),
        }
    }
}

/// The slice of a user shown next to a publicly shared CV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub name: String,
    pub picture: String,
}

impl From<&User> for OwnerProfile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            picture: user.picture.clone(),
        }
    }
}

pub fn new_user_id() -> String {
    format!("user_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("alice@example.com", "Alice", "", Some("$argon2id$v=19$...".into()));
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["is_pro"], false);
    }

    #[test]
    fn test_user_id_shape() {
        let id = new_user_id();
        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), "user_".len() + 12);
    }
}
