use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Request-scoped failures; none of them is fatal to the process
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// `current` is the stored value when the request touched an existing row
    #[error("quantity cannot go below zero (attempted {attempted})")]
    InvalidQuantity {
        current: Option<i32>,
        attempted: i64,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl InventoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidQuantity { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind for clients
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Storage(_) => "storage_error",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_quantity: Option<i32>,
}

impl From<&InventoryError> for ErrorResponse {
    fn from(err: &InventoryError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            login_required: matches!(err, InventoryError::Unauthorized(_)).then_some(true),
            current_quantity: match err {
                InventoryError::InvalidQuantity { current, .. } => *current,
                _ => None,
            },
        }
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {:#}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            InventoryError::not_found("Set '1-1'").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            InventoryError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            InventoryError::InvalidQuantity {
                current: Some(0),
                attempted: -1
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            InventoryError::validation("bad id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InventoryError::Storage(anyhow::anyhow!("pool closed")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body() {
        let err = InventoryError::InvalidQuantity {
            current: Some(0),
            attempted: -1,
        };
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["kind"], "invalid_quantity");
        assert_eq!(body["current_quantity"], 0);
        assert!(body.get("login_required").is_none());

        let err = InventoryError::InvalidQuantity {
            current: None,
            attempted: -4,
        };
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert!(body.get("current_quantity").is_none());

        let err = InventoryError::Unauthorized("log in first".into());
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["login_required"], true);
        assert_eq!(body["error"], "log in first");
    }
}
