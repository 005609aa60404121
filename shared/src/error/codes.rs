//! Unified error codes for the dispatch platform
//!
//! Error codes are organized by range:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order and checkout errors
//! - 5xxx: Payment and coupon errors
//! - 6xxx: Catalog errors
//! - 7xxx: Supplier ledger errors
//! - 8xxx: Dispatch and commission errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a bare `u16` so mini-program and console clients can
/// switch on it without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Status change not allowed from the current status
    IllegalTransition = 4003,
    /// Order item not found
    OrderItemNotFound = 4004,
    /// Checkout with no items
    EmptyCart = 4005,
    /// SKU has no usable cost for an online-paid order
    UnpricedSku = 4006,
    /// Purchase-list item references a deleted or invalid SKU
    InvalidItem = 4007,
    /// Order item was already picked
    ItemAlreadyPicked = 4008,
    /// A payment verification is already pending for the order
    VerificationPending = 4009,
    /// Payment verification request not found
    VerificationNotFound = 4010,
    /// Payment verification request already reviewed
    VerificationAlreadyReviewed = 4011,
    /// Purchase-list item not found
    PurchaseListItemNotFound = 4012,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Prepay entry not found
    PrepayNotFound = 5002,
    /// Prepay entry expired
    PrepayExpired = 5003,
    /// Refund request failed
    RefundFailed = 5004,
    /// Payment method not allowed for this operation
    PaymentInvalidMethod = 5005,

    // Coupons
    /// Coupon not found
    CouponNotFound = 5101,
    /// Coupon has expired
    CouponExpired = 5102,
    /// Coupon not eligible for this order
    CouponNotEligible = 5103,
    /// Coupon of this kind is already reserved
    CouponAlreadyReserved = 5104,
    /// Coupon issue count exhausted
    CouponExhausted = 5105,

    // ==================== 6xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product spec not found
    SpecNotFound = 6002,

    // ==================== 7xxx: Supplier ledger ====================
    /// Supplier not found
    SupplierNotFound = 7001,
    /// Order item already covered by an active payment
    ItemAlreadyPaid = 7002,
    /// Payment amount differs from the item subtotal
    AmountMismatch = 7003,
    /// Order item belongs to another supplier
    SupplierMismatch = 7004,
    /// Supplier payment not found
    SupplierPaymentNotFound = 7005,
    /// Supplier payment already cancelled
    SupplierPaymentCancelled = 7006,

    // ==================== 8xxx: Dispatch / commission ====================
    /// Rider not found
    RiderNotFound = 8001,
    /// Employee not found
    EmployeeNotFound = 8002,
    /// Commission record not found
    CommissionNotFound = 8101,
    /// Commission config rejected
    CommissionConfigInvalid = 8102,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Upstream API returned an error
    UpstreamFailure = 9003,
    /// Upstream API timed out
    UpstreamTimeout = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Stored system settings could not be loaded
    SettingsInvalid = 9006,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Role required",
            ErrorCode::AdminRequired => "Admin role required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::IllegalTransition => "Order status change is not allowed",
            ErrorCode::OrderItemNotFound => "Order item not found",
            ErrorCode::EmptyCart => "No items selected for checkout",
            ErrorCode::UnpricedSku => "Item has no cost price and cannot be paid online",
            ErrorCode::InvalidItem => "Item is no longer available",
            ErrorCode::ItemAlreadyPicked => "Order item has already been picked",
            ErrorCode::VerificationPending => "A payment verification is already pending",
            ErrorCode::VerificationNotFound => "Payment verification not found",
            ErrorCode::VerificationAlreadyReviewed => "Payment verification already reviewed",
            ErrorCode::PurchaseListItemNotFound => "Purchase list item not found",

            // Payment
            ErrorCode::PaymentFailed => "Payment failed",
            ErrorCode::PrepayNotFound => "Prepay entry not found",
            ErrorCode::PrepayExpired => "Prepay entry has expired",
            ErrorCode::RefundFailed => "Refund request failed",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponExpired => "Coupon has expired",
            ErrorCode::CouponNotEligible => "Coupon is not eligible for this order",
            ErrorCode::CouponAlreadyReserved => "Coupon is already reserved by another order",
            ErrorCode::CouponExhausted => "Coupon has been fully claimed",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::SpecNotFound => "Product spec not found",

            // Supplier ledger
            ErrorCode::SupplierNotFound => "Supplier not found",
            ErrorCode::ItemAlreadyPaid => "Order item has already been paid to the supplier",
            ErrorCode::AmountMismatch => "Payment amount does not match item subtotal",
            ErrorCode::SupplierMismatch => "Order item belongs to another supplier",
            ErrorCode::SupplierPaymentNotFound => "Supplier payment not found",
            ErrorCode::SupplierPaymentCancelled => "Supplier payment already cancelled",

            // Dispatch / commission
            ErrorCode::RiderNotFound => "Rider not found",
            ErrorCode::EmployeeNotFound => "Employee not found",
            ErrorCode::CommissionNotFound => "Commission record not found",
            ErrorCode::CommissionConfigInvalid => "Commission config is invalid",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::UpstreamFailure => "Upstream service error",
            ErrorCode::UpstreamTimeout => "Upstream service timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::SettingsInvalid => "System settings are invalid",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::IllegalTransition),
            4004 => Ok(ErrorCode::OrderItemNotFound),
            4005 => Ok(ErrorCode::EmptyCart),
            4006 => Ok(ErrorCode::UnpricedSku),
            4007 => Ok(ErrorCode::InvalidItem),
            4008 => Ok(ErrorCode::ItemAlreadyPicked),
            4009 => Ok(ErrorCode::VerificationPending),
            4010 => Ok(ErrorCode::VerificationNotFound),
            4011 => Ok(ErrorCode::VerificationAlreadyReviewed),
            4012 => Ok(ErrorCode::PurchaseListItemNotFound),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PrepayNotFound),
            5003 => Ok(ErrorCode::PrepayExpired),
            5004 => Ok(ErrorCode::RefundFailed),
            5005 => Ok(ErrorCode::PaymentInvalidMethod),
            5101 => Ok(ErrorCode::CouponNotFound),
            5102 => Ok(ErrorCode::CouponExpired),
            5103 => Ok(ErrorCode::CouponNotEligible),
            5104 => Ok(ErrorCode::CouponAlreadyReserved),
            5105 => Ok(ErrorCode::CouponExhausted),

            // Catalog
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::SpecNotFound),

            // Supplier ledger
            7001 => Ok(ErrorCode::SupplierNotFound),
            7002 => Ok(ErrorCode::ItemAlreadyPaid),
            7003 => Ok(ErrorCode::AmountMismatch),
            7004 => Ok(ErrorCode::SupplierMismatch),
            7005 => Ok(ErrorCode::SupplierPaymentNotFound),
            7006 => Ok(ErrorCode::SupplierPaymentCancelled),

            // Dispatch / commission
            8001 => Ok(ErrorCode::RiderNotFound),
            8002 => Ok(ErrorCode::EmployeeNotFound),
            8101 => Ok(ErrorCode::CommissionNotFound),
            8102 => Ok(ErrorCode::CommissionConfigInvalid),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::UpstreamFailure),
            9004 => Ok(ErrorCode::UpstreamTimeout),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::SettingsInvalid),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::PermissionDenied.code(), 2001);
        assert_eq!(ErrorCode::IllegalTransition.code(), 4003);
        assert_eq!(ErrorCode::EmptyCart.code(), 4005);
        assert_eq!(ErrorCode::CouponAlreadyReserved.code(), 5104);
        assert_eq!(ErrorCode::ItemAlreadyPaid.code(), 7002);
        assert_eq!(ErrorCode::CommissionNotFound.code(), 8101);
        assert_eq!(ErrorCode::UpstreamTimeout.code(), 9004);
    }

    #[test]
    fn test_try_from_roundtrips_every_code() {
        let all = [
            ErrorCode::Success,
            ErrorCode::Unknown,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidFormat,
            ErrorCode::RequiredField,
            ErrorCode::ValueOutOfRange,
            ErrorCode::NotAuthenticated,
            ErrorCode::TokenExpired,
            ErrorCode::TokenInvalid,
            ErrorCode::PermissionDenied,
            ErrorCode::RoleRequired,
            ErrorCode::AdminRequired,
            ErrorCode::OrderNotFound,
            ErrorCode::OrderAlreadyPaid,
            ErrorCode::IllegalTransition,
            ErrorCode::OrderItemNotFound,
            ErrorCode::EmptyCart,
            ErrorCode::UnpricedSku,
            ErrorCode::InvalidItem,
            ErrorCode::ItemAlreadyPicked,
            ErrorCode::VerificationPending,
            ErrorCode::VerificationNotFound,
            ErrorCode::VerificationAlreadyReviewed,
            ErrorCode::PurchaseListItemNotFound,
            ErrorCode::PaymentFailed,
            ErrorCode::PrepayNotFound,
            ErrorCode::PrepayExpired,
            ErrorCode::RefundFailed,
            ErrorCode::PaymentInvalidMethod,
            ErrorCode::CouponNotFound,
            ErrorCode::CouponExpired,
            ErrorCode::CouponNotEligible,
            ErrorCode::CouponAlreadyReserved,
            ErrorCode::CouponExhausted,
            ErrorCode::ProductNotFound,
            ErrorCode::SpecNotFound,
            ErrorCode::SupplierNotFound,
            ErrorCode::ItemAlreadyPaid,
            ErrorCode::AmountMismatch,
            ErrorCode::SupplierMismatch,
            ErrorCode::SupplierPaymentNotFound,
            ErrorCode::SupplierPaymentCancelled,
            ErrorCode::RiderNotFound,
            ErrorCode::EmployeeNotFound,
            ErrorCode::CommissionNotFound,
            ErrorCode::CommissionConfigInvalid,
            ErrorCode::InternalError,
            ErrorCode::DatabaseError,
            ErrorCode::UpstreamFailure,
            ErrorCode::UpstreamTimeout,
            ErrorCode::ConfigError,
            ErrorCode::SettingsInvalid,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(3001), Err(InvalidErrorCode(3001)));
        assert_eq!(ErrorCode::try_from(65535), Err(InvalidErrorCode(65535)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::ItemAlreadyPaid).unwrap();
        assert_eq!(json, "7002");
        let code: ErrorCode = serde_json::from_str("4003").unwrap();
        assert_eq!(code, ErrorCode::IllegalTransition);
        assert!(serde_json::from_str::<ErrorCode>("4242").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::CouponExpired.to_string(), "5102");
        assert_eq!(
            InvalidErrorCode(77).to_string(),
            "invalid error code: 77"
        );
    }
}
