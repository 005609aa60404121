//! Unified error system
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`ErrorKind`]: Classification of errors by how the caller should react
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::IllegalTransition, "delivered -> delivering");
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, 400);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::{ErrorCategory, ErrorKind};
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
