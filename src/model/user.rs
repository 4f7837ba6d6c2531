use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MIN_USER_NAME_LEN: usize = 4;
pub const MAX_USER_NAME_LEN: usize = 20;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Stored account; credentials never leave the store layer serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(&self.password_salt, password) == self.password_hash
    }
}

/// Account ready to be inserted (password already hashed)
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub user_name: String,
    pub password_hash: String,
    pub password_salt: String,
}

impl NewUser {
    pub fn with_password(user_name: String, password: &str) -> Self {
        let password_salt = crate::model::generate_salt();
        let password_hash = hash_password(&password_salt, password);
        Self {
            user_name,
            password_hash,
            password_salt,
        }
    }
}

/// Hex-encoded SHA-256 over `salt:password`
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let new_user = NewUser::with_password("brickfan".to_string(), "hunter22");
        assert_ne!(new_user.password_hash, "hunter22");
        assert_eq!(new_user.password_hash.len(), 64);

        let user = User {
            user_id: 1,
            user_name: new_user.user_name,
            password_hash: new_user.password_hash,
            password_salt: new_user.password_salt,
            created_at: Utc::now(),
        };
        assert!(user.verify_password("hunter22"));
        assert!(!user.verify_password("hunter23"));
    }

    #[test]
    fn test_salts_differ_per_user() {
        let a = NewUser::with_password("alice".to_string(), "same-password");
        let b = NewUser::with_password("bobby".to_string(), "same-password");
        assert_ne!(a.password_salt, b.password_salt);
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn test_credentials_not_serialized() {
        let user = User {
            user_id: 7,
            user_name: "builder".to_string(),
            password_hash: "abc".to_string(),
            password_salt: "def".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("\"user_name\":\"builder\""));
    }
}
