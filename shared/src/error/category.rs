//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Permission errors (2xxx)
    Permission,
    /// Order and checkout errors (4xxx)
    Order,
    /// Payment and coupon errors (5xxx)
    Payment,
    /// Catalog errors (6xxx)
    Catalog,
    /// Supplier ledger errors (7xxx)
    Supplier,
    /// Dispatch and commission errors (8xxx)
    Dispatch,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            4000..5000 => Self::Order,
            5000..6000 => Self::Payment,
            6000..7000 => Self::Catalog,
            7000..8000 => Self::Supplier,
            8000..9000 => Self::Dispatch,
            9000.. => Self::System,
            _ => Self::General,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Order => "order",
            Self::Payment => "payment",
            Self::Catalog => "catalog",
            Self::Supplier => "supplier",
            Self::Dispatch => "dispatch",
            Self::System => "system",
        }
    }
}

/// Failure taxonomy shared by every handler
///
/// Orthogonal to [`ErrorCategory`]: the category says which domain raised
/// the error, the kind says how a caller should react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Missing or expired credential
    Authentication,
    /// Role mismatch
    Authorization,
    /// Referenced entity absent
    NotFound,
    /// State-machine or concurrency conflict
    Conflict,
    /// Payment/weather/geo API error or timeout
    Upstream,
    /// Invariant breach or unreachable branch
    Internal,
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    /// Classify this code within the failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                ErrorKind::Authentication
            }
            Self::PermissionDenied | Self::RoleRequired | Self::AdminRequired => {
                ErrorKind::Authorization
            }
            Self::NotFound
            | Self::OrderNotFound
            | Self::OrderItemNotFound
            | Self::VerificationNotFound
            | Self::PurchaseListItemNotFound
            | Self::PrepayNotFound
            | Self::CouponNotFound
            | Self::ProductNotFound
            | Self::SpecNotFound
            | Self::SupplierNotFound
            | Self::SupplierPaymentNotFound
            | Self::RiderNotFound
            | Self::EmployeeNotFound
            | Self::CommissionNotFound => ErrorKind::NotFound,
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::IllegalTransition
            | Self::ItemAlreadyPicked
            | Self::VerificationPending
            | Self::VerificationAlreadyReviewed
            | Self::CouponAlreadyReserved
            | Self::CouponExhausted
            | Self::ItemAlreadyPaid
            | Self::AmountMismatch
            | Self::SupplierMismatch
            | Self::SupplierPaymentCancelled => ErrorKind::Conflict,
            Self::PaymentFailed
            | Self::RefundFailed
            | Self::UpstreamFailure
            | Self::UpstreamTimeout => ErrorKind::Upstream,
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::SettingsInvalid => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(999), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1001), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_code(2001), ErrorCategory::Permission);
        assert_eq!(ErrorCategory::from_code(3001), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Order);
        assert_eq!(ErrorCategory::from_code(5104), ErrorCategory::Payment);
        assert_eq!(ErrorCategory::from_code(6001), ErrorCategory::Catalog);
        assert_eq!(ErrorCategory::from_code(7002), ErrorCategory::Supplier);
        assert_eq!(ErrorCategory::from_code(8101), ErrorCategory::Dispatch);
        assert_eq!(ErrorCategory::from_code(9001), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(10000), ErrorCategory::System);
    }

    #[test]
    fn test_error_code_kind() {
        assert_eq!(ErrorCode::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::UnpricedSku.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::TokenExpired.kind(), ErrorKind::Authentication);
        assert_eq!(ErrorCode::AdminRequired.kind(), ErrorKind::Authorization);
        assert_eq!(ErrorCode::OrderNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::IllegalTransition.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::ItemAlreadyPaid.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::CouponAlreadyReserved.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::AmountMismatch.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::UpstreamTimeout.kind(), ErrorKind::Upstream);
        assert_eq!(ErrorCode::DatabaseError.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_category_name() {
        assert_eq!(ErrorCategory::Supplier.name(), "supplier");
        assert_eq!(ErrorCode::RiderNotFound.category().name(), "dispatch");
    }
}
