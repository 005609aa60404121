//! Coupon Engine
//!
//! Picks at most one delivery-fee coupon and one amount coupon for a
//! checkout and drives the user coupon state machine. The two kinds are
//! applied by separate code paths.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{CouponKind, UserCoupon, UserCouponStatus};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

use crate::pricing::round_money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon {0} not found")]
    NotFound(i64),
    #[error("coupon {0} has expired")]
    Expired(i64),
    #[error("coupon {id} is not eligible: {reason}")]
    NotEligible { id: i64, reason: &'static str },
    #[error("a {} coupon is already reserved", .0.as_str())]
    AlreadyReserved(CouponKind),
    #[error("coupon {0} is exhausted")]
    Exhausted(i64),
    #[error("coupon {id} cannot go from {from:?} via {event:?}")]
    InvalidState {
        id: i64,
        from: UserCouponStatus,
        event: CouponEvent,
    },
}

impl From<CouponError> for AppError {
    fn from(e: CouponError) -> Self {
        let message = e.to_string();
        let (code, id) = match e {
            CouponError::NotFound(id) => (ErrorCode::CouponNotFound, Some(id)),
            CouponError::Expired(id) => (ErrorCode::CouponExpired, Some(id)),
            CouponError::NotEligible { id, .. } => (ErrorCode::CouponNotEligible, Some(id)),
            CouponError::AlreadyReserved(_) => (ErrorCode::CouponAlreadyReserved, None),
            CouponError::Exhausted(id) => (ErrorCode::CouponExhausted, Some(id)),
            CouponError::InvalidState { id, .. } => (ErrorCode::CouponNotEligible, Some(id)),
        };
        let err = AppError::with_message(code, message);
        match id {
            Some(id) => err.with_detail("user_coupon_id", id),
            None => err,
        }
    }
}

/// The part of a priced order coupons look at
#[derive(Debug, Clone)]
pub struct CouponOrderView {
    pub goods_amount: Decimal,
    pub customer_delivery_fee: Decimal,
    pub category_ids: HashSet<i64>,
}

/// Explicit user choice, by user coupon id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponChoice {
    pub delivery_coupon_id: Option<i64>,
    pub amount_coupon_id: Option<i64>,
}

/// A chosen coupon with the discount it grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponApplication {
    DeliveryWaiver { user_coupon_id: i64, waived: Decimal },
    AmountOff { user_coupon_id: i64, discount: Decimal },
}

impl CouponApplication {
    pub fn user_coupon_id(&self) -> i64 {
        match self {
            Self::DeliveryWaiver { user_coupon_id, .. } | Self::AmountOff { user_coupon_id, .. } => {
                *user_coupon_id
            }
        }
    }
}

/// Outcome of coupon selection for one order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupons {
    pub delivery: Option<CouponApplication>,
    pub amount: Option<CouponApplication>,
}

impl AppliedCoupons {
    pub fn delivery_waiver(&self) -> Decimal {
        match self.delivery {
            Some(CouponApplication::DeliveryWaiver { waived, .. }) => waived,
            _ => Decimal::ZERO,
        }
    }

    pub fn amount_discount(&self) -> Decimal {
        match self.amount {
            Some(CouponApplication::AmountOff { discount, .. }) => discount,
            _ => Decimal::ZERO,
        }
    }

    pub fn coupon_discount(&self) -> Decimal {
        self.delivery_waiver() + self.amount_discount()
    }

    pub fn delivery_coupon_id(&self) -> Option<i64> {
        self.delivery.map(|c| c.user_coupon_id())
    }

    pub fn amount_coupon_id(&self) -> Option<i64> {
        self.amount.map(|c| c.user_coupon_id())
    }

    pub fn user_coupon_ids(&self) -> Vec<i64> {
        self.delivery
            .iter()
            .chain(self.amount.iter())
            .map(|c| c.user_coupon_id())
            .collect()
    }
}

/// A delivery-fee coupon waives the whole customer delivery fee
fn delivery_waiver(fee: Decimal) -> Decimal {
    round_money(fee.max(Decimal::ZERO))
}

fn amount_discount(coupon: &UserCoupon, goods_amount: Decimal) -> Decimal {
    round_money(coupon.coupon.discount_value.max(Decimal::ZERO).min(goods_amount))
}

/// Check that `coupon` may be applied to `order`
fn check_eligible(
    coupon: &UserCoupon,
    order: &CouponOrderView,
    now: DateTime<Utc>,
) -> Result<(), CouponError> {
    match coupon.status {
        UserCouponStatus::Issued => {}
        UserCouponStatus::Reserved => return Err(CouponError::AlreadyReserved(coupon.kind())),
        UserCouponStatus::Expired => return Err(CouponError::Expired(coupon.id)),
        UserCouponStatus::Used | UserCouponStatus::Revoked => {
            return Err(CouponError::NotEligible {
                id: coupon.id,
                reason: "coupon is no longer usable",
            });
        }
    }
    if coupon.is_expired_at(now) {
        return Err(CouponError::Expired(coupon.id));
    }
    if !coupon.coupon.is_active {
        return Err(CouponError::NotEligible {
            id: coupon.id,
            reason: "coupon is disabled",
        });
    }
    if coupon.coupon.is_exhausted() {
        return Err(CouponError::Exhausted(coupon.id));
    }
    if !coupon.coupon.category_ids.is_empty()
        && !coupon
            .coupon
            .category_ids
            .iter()
            .any(|id| order.category_ids.contains(id))
    {
        return Err(CouponError::NotEligible {
            id: coupon.id,
            reason: "no item in the restricted categories",
        });
    }
    if order.goods_amount < coupon.coupon.min_amount {
        return Err(CouponError::NotEligible {
            id: coupon.id,
            reason: "order below minimum amount",
        });
    }
    Ok(())
}

/// Higher value first, then later expiry, then lower id
fn better(a: (&UserCoupon, Decimal), b: (&UserCoupon, Decimal)) -> Ordering {
    a.1.cmp(&b.1)
        .then_with(|| a.0.expires_at.cmp(&b.0.expires_at))
        .then_with(|| b.0.id.cmp(&a.0.id))
}

fn pick_best<'a>(
    wallet: &'a [UserCoupon],
    kind: CouponKind,
    order: &CouponOrderView,
    now: DateTime<Utc>,
    value: impl Fn(&UserCoupon) -> Decimal,
) -> Option<(&'a UserCoupon, Decimal)> {
    wallet
        .iter()
        .filter(|c| c.kind() == kind && check_eligible(c, order, now).is_ok())
        .map(|c| (c, value(c)))
        .filter(|(_, v)| *v > Decimal::ZERO)
        .max_by(|a, b| better(*a, *b))
}

fn pick_explicit<'a>(
    wallet: &'a [UserCoupon],
    id: i64,
    kind: CouponKind,
    order: &CouponOrderView,
    now: DateTime<Utc>,
) -> Result<&'a UserCoupon, CouponError> {
    let coupon = wallet
        .iter()
        .find(|c| c.id == id)
        .ok_or(CouponError::NotFound(id))?;
    if coupon.kind() != kind {
        return Err(CouponError::NotEligible {
            id,
            reason: "coupon kind does not match",
        });
    }
    check_eligible(coupon, order, now)?;
    Ok(coupon)
}

/// Select coupons from the user's wallet
///
/// `wallet` holds every coupon the user owns, including reserved ones: a
/// reserved coupon of a kind blocks that kind for further orders.
pub fn select(
    wallet: &[UserCoupon],
    choice: Option<CouponChoice>,
    order: &CouponOrderView,
    now: DateTime<Utc>,
) -> Result<AppliedCoupons, CouponError> {
    let reserved = |kind: CouponKind| {
        wallet
            .iter()
            .any(|c| c.kind() == kind && c.status == UserCouponStatus::Reserved)
    };

    let mut applied = AppliedCoupons::default();

    match choice {
        Some(choice) => {
            if let Some(id) = choice.delivery_coupon_id {
                if reserved(CouponKind::DeliveryFee) {
                    return Err(CouponError::AlreadyReserved(CouponKind::DeliveryFee));
                }
                let c = pick_explicit(wallet, id, CouponKind::DeliveryFee, order, now)?;
                let waived = delivery_waiver(order.customer_delivery_fee);
                if waived <= Decimal::ZERO {
                    return Err(CouponError::NotEligible {
                        id,
                        reason: "order already ships free",
                    });
                }
                applied.delivery = Some(CouponApplication::DeliveryWaiver {
                    user_coupon_id: c.id,
                    waived,
                });
            }
            if let Some(id) = choice.amount_coupon_id {
                if reserved(CouponKind::Amount) {
                    return Err(CouponError::AlreadyReserved(CouponKind::Amount));
                }
                let c = pick_explicit(wallet, id, CouponKind::Amount, order, now)?;
                applied.amount = Some(CouponApplication::AmountOff {
                    user_coupon_id: c.id,
                    discount: amount_discount(c, order.goods_amount),
                });
            }
        }
        None => {
            if !reserved(CouponKind::DeliveryFee) {
                applied.delivery = pick_best(wallet, CouponKind::DeliveryFee, order, now, |_| {
                    delivery_waiver(order.customer_delivery_fee)
                })
                .map(|(c, waived)| CouponApplication::DeliveryWaiver {
                    user_coupon_id: c.id,
                    waived,
                });
            }
            if !reserved(CouponKind::Amount) {
                applied.amount = pick_best(wallet, CouponKind::Amount, order, now, |c| {
                    amount_discount(c, order.goods_amount)
                })
                .map(|(c, discount)| CouponApplication::AmountOff {
                    user_coupon_id: c.id,
                    discount,
                });
            }
        }
    }

    Ok(applied)
}

/// Events on a user coupon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponEvent {
    /// Order created with this coupon
    Reserve,
    /// Order settled
    Consume,
    /// Order cancelled before settlement
    Release,
    /// Settled order cancelled and refunded
    Restore,
    Expire,
    Revoke,
}

/// Drop applications whose coupon can no longer be reserved
///
/// `locked` holds the wallet rows of the applied coupons, read under lock.
/// Returns the dropped user coupon ids; the money figures are untouched.
pub fn retain_reservable(applied: &mut AppliedCoupons, locked: &[UserCoupon]) -> Vec<i64> {
    let reservable = |id: i64| {
        locked
            .iter()
            .any(|c| c.id == id && next_status(c.id, c.status, CouponEvent::Reserve).is_ok())
    };
    let mut dropped = Vec::new();
    for slot in [&mut applied.delivery, &mut applied.amount] {
        let Some(id) = slot.map(|a| a.user_coupon_id()) else {
            continue;
        };
        if !reservable(id) {
            dropped.push(id);
            *slot = None;
        }
    }
    dropped
}

/// Whether `coupon` is the reservation or redemption of `order_id`
///
/// Settlement and cancellation only move coupons their order holds.
pub fn held_by(coupon: &UserCoupon, order_id: i64) -> bool {
    coupon.order_id == Some(order_id)
        && matches!(
            coupon.status,
            UserCouponStatus::Reserved | UserCouponStatus::Used
        )
}

/// User coupon state machine
pub fn next_status(
    id: i64,
    from: UserCouponStatus,
    event: CouponEvent,
) -> Result<UserCouponStatus, CouponError> {
    use CouponEvent as E;
    use UserCouponStatus as S;
    match (from, event) {
        (S::Issued, E::Reserve) => Ok(S::Reserved),
        (S::Reserved, E::Consume) => Ok(S::Used),
        // already consumed
        (S::Used, E::Consume) => Ok(S::Used),
        (S::Reserved, E::Release) => Ok(S::Issued),
        (S::Issued, E::Release) => Ok(S::Issued),
        (S::Used, E::Restore) | (S::Reserved, E::Restore) => Ok(S::Issued),
        (S::Issued, E::Restore) => Ok(S::Issued),
        (S::Issued, E::Expire) | (S::Reserved, E::Expire) => Ok(S::Expired),
        (S::Issued, E::Revoke) | (S::Reserved, E::Revoke) => Ok(S::Revoked),
        (from, event) => Err(CouponError::InvalidState { id, from, event }),
    }
}

#[cfg(test)]
mod tests;
