//! Error types and API response structures

use super::category::ErrorKind;
use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create a not authenticated error
    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    /// Create a permission denied error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    /// Create an invalid request error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    /// Create an invalid token error
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, msg)
    }

    /// Create a token expired error
    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired)
    }

    /// Create an upstream failure error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::UpstreamFailure, msg)
    }

    /// Create an upstream timeout error
    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::UpstreamTimeout, msg)
    }

    /// Whether the message must be replaced before reaching the client
    fn is_opaque(&self) -> bool {
        matches!(self.code.kind(), ErrorKind::Internal | ErrorKind::Upstream)
    }
}

/// Unified API response structure
///
/// - `code`: HTTP status (200 on success)
/// - `message`: Human-readable message
/// - `data`: Response payload (on success)
/// - `details`: Additional error details (on failure), always carrying `error_code`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }

    /// Create a success response with custom message and data
    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
            details: None,
        }
    }

    /// Whether this response reports success
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::OK.as_u16()
    }
}

impl ApiResponse<()> {
    /// Create a success response without data
    pub fn ok() -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "OK".to_string(),
            data: None,
            details: None,
        }
    }

    /// Create an error response from an AppError
    ///
    /// Internal and upstream failures keep only the generic message for
    /// their code; the full text stays in the server log.
    pub fn error(err: &AppError) -> Self {
        let message = if err.is_opaque() {
            err.code.message().to_string()
        } else {
            err.message.clone()
        };
        let mut details = if err.is_opaque() {
            HashMap::new()
        } else {
            err.details.clone().unwrap_or_default()
        };
        details.insert("error_code".to_string(), Value::from(err.code.code()));
        Self {
            code: err.http_status().as_u16(),
            message,
            data: None,
            details: Some(details),
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        if self.is_opaque() {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::OrderNotFound);
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.message, "Order not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("quantity must be positive")
            .with_detail("field", "quantity")
            .with_detail("min", 1);

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "quantity");
        assert_eq!(details.get("min").unwrap(), 1);
    }

    #[test]
    fn test_not_found_constructor() {
        let err = AppError::not_found("Supplier 7");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Supplier 7 not found");
        assert!(err.details.as_ref().unwrap().contains_key("resource"));
    }

    #[test]
    fn test_success_response_uses_http_200() {
        let resp = ApiResponse::success(vec![1, 2, 3]);
        assert_eq!(resp.code, 200);
        assert!(resp.is_success());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_error_response_carries_status_and_code() {
        let err = AppError::with_message(ErrorCode::ItemAlreadyPaid, "item 42 already paid")
            .with_detail("order_item_id", 42);
        let resp = ApiResponse::<()>::error(&err);
        assert_eq!(resp.code, 409);
        assert_eq!(resp.message, "item 42 already paid");
        let details = resp.details.unwrap();
        assert_eq!(details.get("error_code").unwrap(), 7002);
        assert_eq!(details.get("order_item_id").unwrap(), 42);
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let err = AppError::database("duplicate key 'uq_order_number' on table orders");
        let resp = ApiResponse::<()>::error(&err);
        assert_eq!(resp.code, 500);
        assert_eq!(resp.message, "Database error");
        let details = resp.details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details.get("error_code").unwrap(), 9002);
    }

    #[test]
    fn test_upstream_timeout_message_is_generic() {
        let err = AppError::upstream_timeout("pay gateway did not answer within 10s");
        let resp = ApiResponse::<()>::error(&err);
        assert_eq!(resp.code, 500);
        assert_eq!(resp.message, "Upstream service timed out");
    }
}
