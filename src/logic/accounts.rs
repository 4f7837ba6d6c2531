use crate::error::{InventoryError, InventoryResult};
use crate::model::{NewUser, User, MAX_USER_NAME_LEN, MIN_PASSWORD_LEN, MIN_USER_NAME_LEN};
use crate::store::traits::Store;

pub struct AccountService;

impl AccountService {
    pub fn validate_credentials(user_name: &str, password: &str) -> InventoryResult<()> {
        let name_len = user_name.chars().count();
        if !(MIN_USER_NAME_LEN..=MAX_USER_NAME_LEN).contains(&name_len) {
            return Err(InventoryError::validation(format!(
                "Username must be between {} and {} characters",
                MIN_USER_NAME_LEN, MAX_USER_NAME_LEN
            )));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(InventoryError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }

    pub async fn register<S: Store>(
        store: &S,
        user_name: &str,
        password: &str,
    ) -> InventoryResult<User> {
        let user_name = user_name.trim();
        Self::validate_credentials(user_name, password)?;

        let user = store
            .create_user(NewUser::with_password(user_name.to_string(), password))
            .await?
            .ok_or_else(|| InventoryError::Conflict("Username already exists".to_string()))?;

        log::info!("Registered user {} ({})", user.user_id, user.user_name);
        Ok(user)
    }

    pub async fn login<S: Store>(
        store: &S,
        user_name: &str,
        password: &str,
    ) -> InventoryResult<User> {
        let invalid = || InventoryError::Unauthorized("Invalid username or password".to_string());

        let user = store
            .get_user_by_name(user_name.trim())
            .await?
            .ok_or_else(invalid)?;
        if !user.verify_password(password) {
            log::warn!("Failed login for user {}", user.user_name);
            return Err(invalid());
        }
        Ok(user)
    }
}
