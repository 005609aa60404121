//! Coupon Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Coupon kind
///
/// The two kinds discount different parts of the bill and are applied by
/// separate code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Waives (part of) the customer delivery fee
    DeliveryFee,
    /// Fixed amount off the goods
    Amount,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeliveryFee => "delivery_fee",
            Self::Amount => "amount",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "delivery_fee" => Some(Self::DeliveryFee),
            "amount" => Some(Self::Amount),
            _ => None,
        }
    }
}

/// Coupon template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub name: String,
    pub kind: CouponKind,
    /// Amount off for amount coupons; delivery-fee coupons waive the whole fee
    pub discount_value: Decimal,
    pub min_amount: Decimal,
    /// Empty means any category
    #[serde(default)]
    pub category_ids: Vec<i64>,
    /// 0 means unlimited
    pub total_count: i32,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
}

impl Coupon {
    pub fn is_exhausted(&self) -> bool {
        self.total_count > 0 && self.used_count >= self.total_count
    }
}

/// User coupon lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCouponStatus {
    Issued,
    Reserved,
    Used,
    Expired,
    Revoked,
}

impl UserCouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Reserved => "reserved",
            Self::Used => "used",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "issued" => Some(Self::Issued),
            "reserved" => Some(Self::Reserved),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Issued coupon held by a user, joined with its template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCoupon {
    pub id: i64,
    pub user_id: i64,
    pub coupon: Coupon,
    pub status: UserCouponStatus,
    pub expires_at: DateTime<Utc>,
    /// Order holding the reservation, if any
    pub order_id: Option<i64>,
}

impl UserCoupon {
    pub fn kind(&self) -> CouponKind {
        self.coupon.kind
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at || now > self.coupon.valid_to || now < self.coupon.valid_from
    }
}
