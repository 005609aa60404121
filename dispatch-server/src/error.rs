//! Unified service-layer error type
//!
//! `ServiceError` bridges DB-layer errors (`sqlx::Error`, `BoxError`) and the
//! API-layer error (`AppError`), so handlers can use `?` on both.

use axum::Json;
use axum::response::IntoResponse;
use shared::error::{ApiResponse, AppError, ErrorCode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service-layer error
///
/// - `Db`: database or infrastructure error (logged, mapped to InternalError)
/// - `App`: business-rule error (passed through to the client)
#[derive(Debug)]
pub enum ServiceError {
    Db(BoxError),
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

/// Domain errors convert through `AppError`
macro_rules! via_app_error {
    ($($ty:ty),* $(,)?) => {
        $(impl From<$ty> for ServiceError {
            fn from(e: $ty) -> Self {
                ServiceError::App(e.into())
            }
        })*
    };
}

via_app_error!(
    crate::pricing::FeeError,
    crate::pricing::ParamError,
    crate::coupons::CouponError,
    crate::commission::CommissionError,
    crate::orders::TransitionError,
    crate::orders::PrepayError,
    crate::ledger::LedgerError,
    crate::payment::GatewayError,
);

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Handler result: success envelope or error response
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_are_opaque() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
        assert_eq!(app.http_status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn domain_errors_keep_their_code() {
        let err: ServiceError = crate::ledger::LedgerError::ItemAlreadyPaid(42).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::ItemAlreadyPaid);
        assert_eq!(app.http_status(), http::StatusCode::CONFLICT);
    }
}
