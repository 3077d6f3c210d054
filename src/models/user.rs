//! User model
//!
//! Dashboard accounts of the local identity provider. Passwords are stored
//! only as argon2 hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered dashboard user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user; `password_hash` must already be hashed
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Email/password pair for sign-in and sign-up
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("a@b.co".to_string(), "$argon2id$secret".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("a@b.co"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
