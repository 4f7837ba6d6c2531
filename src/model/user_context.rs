use crate::model::UserId;
use serde::{Deserialize, Serialize};

/// Verified identity forwarded by the session layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: UserId,
    pub user_name: Option<String>,
}

impl UserContext {
    /// Create a new UserContext with just a user ID
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            user_name: None,
        }
    }

    pub fn with_name(user_id: UserId, user_name: Option<String>) -> Self {
        Self { user_id, user_name }
    }
}
