//! Settlement Orchestrator
//!
//! Runs inside the caller's transaction with the order row locked. Each step
//! is guarded by a marker (coupon state, commission row per order,
//! `settlement_date`) so a replay changes nothing.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use shared::models::{Order, OrderStatus, RefundStatus, UserCouponStatus};
use sqlx::{MySqlConnection, MySqlPool};

use crate::commission::{self, Reversal};
use crate::coupons::{self, CouponEvent};
use crate::db;
use crate::error::ServiceResult;
use crate::orders::settlement::{self as plan, PaidDecision};
use crate::payment::{self, PaymentGateway, RefundRequest};

/// delivered → paid, then settle; no-op on an already paid order
///
/// Returns whether anything changed.
pub async fn mark_paid(
    conn: &mut MySqlConnection,
    order: &Order,
    zone: FixedOffset,
    now: DateTime<Utc>,
) -> ServiceResult<bool> {
    match plan::decide_mark_paid(order)? {
        PaidDecision::AlreadySettled => {
            tracing::debug!(order_id = order.id, "Order already paid");
            Ok(false)
        }
        PaidDecision::Settle => {
            db::orders::set_status(conn, order.id, OrderStatus::Paid).await?;
            settle(conn, order, zone, now).await?;
            Ok(true)
        }
    }
}

/// Post coupons, commission and the settlement marker for a paid order
pub async fn settle(
    conn: &mut MySqlConnection,
    order: &Order,
    zone: FixedOffset,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    if order.is_settled() {
        return Ok(());
    }

    consume_coupons(conn, order, now).await?;
    let commission_total = post_commission(conn, order, zone, now).await?;

    let (order_profit, net_profit) = plan::profits(order, commission_total);
    db::orders::mark_settled(conn, order.id, now, order_profit, net_profit).await?;

    tracing::info!(
        order_id = order.id,
        order_number = %order.order_number,
        total = %order.total_amount,
        commission = %commission_total,
        "Order settled"
    );
    Ok(())
}

async fn consume_coupons(
    conn: &mut MySqlConnection,
    order: &Order,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    for c in db::coupons::lock_many(conn, &order.coupon_ids()).await? {
        if !coupons::held_by(&c, order.id) {
            tracing::warn!(
                order_id = order.id,
                user_coupon_id = c.id,
                status = c.status.as_str(),
                "Coupon not held by this order, skipped"
            );
            continue;
        }
        let to = coupons::next_status(c.id, c.status, CouponEvent::Consume)?;
        if to == c.status {
            continue;
        }
        db::coupons::set_status(conn, c.id, c.status, to, Some(order.id), now).await?;
        if !db::coupons::increment_used(conn, c.coupon.id).await? {
            // The coupon was granted at checkout; the counter stays capped
            tracing::warn!(
                coupon_id = c.coupon.id,
                user_coupon_id = c.id,
                "Coupon template already at total_count"
            );
        }
    }
    Ok(())
}

/// Commission for the bound salesperson, if any; returns its total
async fn post_commission(
    conn: &mut MySqlConnection,
    order: &Order,
    zone: FixedOffset,
    now: DateTime<Utc>,
) -> ServiceResult<Decimal> {
    if let Some(existing) = db::commissions::by_order(conn, order.id).await? {
        return Ok(existing.total_commission);
    }
    let Some(code) = db::users::sales_code(conn, order.user_id).await? else {
        return Ok(Decimal::ZERO);
    };

    let config = db::commissions::config_or_default(&mut *conn, &code).await?;
    let month = commission::calculation_month(now, zone);
    let rows = db::commissions::month_rows(conn, &code, &month, true).await?;
    let month_to_date = commission::month_volume(&rows);
    let is_new = db::users::settled_order_count(conn, order.user_id, order.id).await? == 0;

    let entry = plan::commission_entry(order, &config, is_new, month_to_date, now, zone);
    db::commissions::insert(conn, &entry).await?;
    tracing::info!(
        order_id = order.id,
        employee_code = %code,
        tier = entry.result.applied_tier,
        total = %entry.result.total_commission,
        "Commission recorded"
    );
    Ok(entry.result.total_commission)
}

/// Return a cancelled order's coupons to the wallet
///
/// Coupons another order holds stay where they are.
pub async fn restore_coupons(
    conn: &mut MySqlConnection,
    order_id: i64,
    ids: &[i64],
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    for c in db::coupons::lock_many(conn, ids).await? {
        if !coupons::held_by(&c, order_id) {
            tracing::debug!(order_id, user_coupon_id = c.id, "Coupon not held by this order");
            continue;
        }
        let to = coupons::next_status(c.id, c.status, CouponEvent::Restore)?;
        if to == c.status {
            continue;
        }
        db::coupons::set_status(conn, c.id, c.status, to, None, now).await?;
        if c.status == UserCouponStatus::Used {
            db::coupons::decrement_used(conn, c.coupon.id).await?;
        }
    }
    Ok(())
}

/// Delete or flag the commission row of a cancelled order
pub async fn reverse_commission(conn: &mut MySqlConnection, order_id: i64) -> ServiceResult<()> {
    let Some(row) = db::commissions::by_order(conn, order_id).await? else {
        return Ok(());
    };
    match commission::reversal_for(&row) {
        Reversal::Delete => db::commissions::delete(conn, row.id).await?,
        Reversal::MarkCancelled => db::commissions::mark_cancelled(conn, row.id).await?,
        Reversal::Keep => {}
    }
    tracing::info!(order_id, commission_id = row.id, "Commission reversed");
    Ok(())
}

/// Build the gateway refund for an order, once per order
///
/// None when a refund is already under way or finished.
pub fn refund_request(order: &Order, amount: Decimal, reason: &str) -> Option<RefundRequest> {
    if order.refund_status != RefundStatus::None {
        return None;
    }
    Some(RefundRequest {
        out_trade_no: order.order_number.clone(),
        out_refund_no: payment::refund_number(&order.order_number),
        refund_amount: amount,
        total_amount: order.total_amount,
        reason: reason.to_string(),
    })
}

/// Mark the refund processing inside the caller's transaction
///
/// The gateway is called with [`send_refund`] after commit.
pub async fn claim_refund(
    conn: &mut MySqlConnection,
    order: &Order,
    amount: Decimal,
    reason: &str,
) -> ServiceResult<Option<RefundRequest>> {
    let Some(req) = refund_request(order, amount, reason) else {
        return Ok(None);
    };
    db::orders::set_refund(conn, order.id, RefundStatus::Processing, None).await?;
    Ok(Some(req))
}

/// Submit a claimed refund; a rejection is recorded as failed
pub async fn send_refund(
    pool: &MySqlPool,
    gateway: &dyn PaymentGateway,
    order_id: i64,
    req: &RefundRequest,
) -> ServiceResult<RefundStatus> {
    let (status, refund_id) = match gateway.refund(req).await {
        Ok(accepted) => (RefundStatus::Processing, Some(accepted.refund_id)),
        Err(e) => {
            tracing::error!(order_id, out_refund_no = %req.out_refund_no, error = %e, "Refund request failed");
            (RefundStatus::Failed, None)
        }
    };
    let mut conn = pool.acquire().await?;
    db::orders::set_refund(&mut conn, order_id, status, refund_id.as_deref()).await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::settlement::tests::order;
    use rust_decimal_macros::dec;

    #[test]
    fn refund_is_requested_once_per_order() {
        let mut o = order(OrderStatus::Cancelled);
        let req = refund_request(&o, dec!(600), "Order cancelled").unwrap();
        assert_eq!(req.out_trade_no, "P202506011200000001123456");
        assert_eq!(req.out_refund_no, "R202506011200000001123456");
        assert_eq!(req.refund_amount, dec!(600));
        assert_eq!(req.total_amount, dec!(600));

        for status in [RefundStatus::Processing, RefundStatus::Success, RefundStatus::Failed] {
            o.refund_status = status;
            assert!(refund_request(&o, dec!(600), "Order cancelled").is_none());
        }
    }
}
