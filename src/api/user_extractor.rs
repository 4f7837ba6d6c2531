use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::error::InventoryError;
use crate::model::{UserContext, UserId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Axum extractor for UserContext from request headers
///
/// The session layer in front of this service forwards the logged-in user:
/// - X-User-Id: Required numeric user identifier
/// - X-User-Name: Optional display name
///
/// Requests without an identity are rejected with 401 and `login_required`.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = InventoryError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_headers(&parts.headers)
    }
}

fn user_from_headers(headers: &HeaderMap) -> Result<UserContext, InventoryError> {
    let raw_id = extract_header_value(headers, USER_ID_HEADER)
        .ok_or_else(|| InventoryError::Unauthorized("Login required".to_string()))?;
    let user_id: UserId = raw_id
        .trim()
        .parse()
        .map_err(|_| InventoryError::validation(format!("Invalid user id '{}'", raw_id)))?;

    Ok(UserContext::with_name(
        user_id,
        extract_header_value(headers, USER_NAME_HEADER),
    ))
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_user_context_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("42"),
        );
        headers.insert(
            HeaderName::from_static(USER_NAME_HEADER),
            HeaderValue::from_static("brickfan"),
        );

        let ctx = user_from_headers(&headers).unwrap();
        assert_eq!(ctx.user_id, 42);
        assert_eq!(ctx.user_name, Some("brickfan".to_string()));
    }

    #[test]
    fn test_missing_identity_requires_login() {
        let err = user_from_headers(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, InventoryError::Unauthorized(_)));
    }

    #[test]
    fn test_non_numeric_identity_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("test-user-123"),
        );
        let err = user_from_headers(&headers).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }
}
