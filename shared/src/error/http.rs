//! HTTP status code mapping for error codes

use super::category::ErrorKind;
use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    ///
    /// Conflicts answer 400 with a specific message, except `ItemAlreadyPaid`
    /// which the supplier payment endpoint reports as 409.
    pub fn http_status(&self) -> StatusCode {
        if self.is_success() {
            return StatusCode::OK;
        }
        if matches!(self, Self::ItemAlreadyPaid) {
            return StatusCode::CONFLICT;
        }
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::OrderNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::SupplierPaymentNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflicts_are_bad_request_except_item_already_paid() {
        assert_eq!(
            ErrorCode::IllegalTransition.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::CouponAlreadyReserved.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::AmountMismatch.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::ItemAlreadyPaid.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_auth_status() {
        assert_eq!(
            ErrorCode::NotAuthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::TokenExpired.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::AdminRequired.http_status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_upstream_and_internal_status() {
        assert_eq!(
            ErrorCode::UpstreamTimeout.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::PaymentFailed.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_default() {
        assert_eq!(ErrorCode::EmptyCart.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::ValueOutOfRange.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
