//! Order Lifecycle Manager transactions
//!
//! Rider accept and complete, cancellation with refund, item picking,
//! payment verification review and the refund callback.

use chrono::{DateTime, Utc};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Order, OrderItem, OrderStatus, PaymentVerificationRequest, RefundStatus, VerificationStatus,
};

use super::{order_not_found, settlement};
use crate::auth::{Identity, Role};
use crate::db;
use crate::error::ServiceResult;
use crate::orders::settlement as plan;
use crate::orders::{OrderAction, status};
use crate::payment::RefundNotify;
use crate::state::AppState;

async fn reload(state: &AppState, order_id: i64) -> ServiceResult<Order> {
    Ok(db::orders::get(&state.pool, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?)
}

/// pending_delivery → delivering; the rider is assigned to the order
pub async fn accept(state: &AppState, order_id: i64, rider: &Identity) -> ServiceResult<Order> {
    let code = rider.require_code()?;
    let mut tx = state.pool.begin().await?;
    let order = db::orders::lock(&mut tx, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;

    let next = status::apply(order.status, OrderAction::Accept)?;
    db::orders::set_status(&mut tx, order_id, next).await?;
    db::orders::assign_rider(&mut tx, order_id, code).await?;
    db::orders::append_delivery_log(&mut tx, order_id, code, "accepted", &[]).await?;
    tx.commit().await?;

    tracing::info!(order_id, employee_code = %code, "Order accepted");
    reload(state, order_id).await
}

/// delivering → delivered, and on to paid when the order was prepaid
pub async fn complete(
    state: &AppState,
    order_id: i64,
    rider: &Identity,
    photo_urls: &[String],
    now: DateTime<Utc>,
) -> ServiceResult<Order> {
    let code = rider.require_code()?;
    let mut tx = state.pool.begin().await?;
    let order = db::orders::lock(&mut tx, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;

    if order
        .delivery_employee_code
        .as_deref()
        .is_some_and(|assigned| assigned != code)
    {
        return Err(AppError::forbidden("Order is assigned to another rider").into());
    }

    let next = plan::plan_complete(&order)?;
    db::orders::set_status(&mut tx, order_id, next.next).await?;
    db::orders::append_delivery_log(&mut tx, order_id, code, "completed", photo_urls).await?;
    if next.settle {
        settlement::settle(&mut tx, &order, state.zone, now).await?;
    }
    tx.commit().await?;

    tracing::info!(order_id, employee_code = %code, status = %next.next, "Order delivered");
    reload(state, order_id).await
}

/// Cancel an order, returning coupons, commission and money
pub async fn cancel(
    state: &AppState,
    order_id: i64,
    caller: &Identity,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<Order> {
    let mut tx = state.pool.begin().await?;
    let order = db::orders::lock(&mut tx, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;

    if caller.role == Role::Customer && order.user_id != caller.id {
        return Err(order_not_found(order_id).into());
    }

    let work = plan::plan_cancel(&order)?;
    db::orders::set_status(&mut tx, order_id, OrderStatus::Cancelled).await?;
    settlement::restore_coupons(&mut tx, order_id, &work.restore_coupon_ids, now).await?;
    if work.reverse_commission {
        settlement::reverse_commission(&mut tx, order_id).await?;
    }
    let refund = match work.refund_amount {
        Some(amount) => {
            let reason = reason.unwrap_or("Order cancelled");
            settlement::claim_refund(&mut tx, &order, amount, reason).await?
        }
        None => None,
    };
    tx.commit().await?;

    if let Some(req) = refund {
        settlement::send_refund(&state.pool, state.gateway.as_ref(), order_id, &req).await?;
    }

    tracing::info!(
        order_id,
        operator = %caller.operator(),
        refund = ?work.refund_amount,
        "Order cancelled"
    );
    reload(state, order_id).await
}

/// Mark one order line picked; a line is picked at most once
pub async fn pick_item(
    state: &AppState,
    order_id: i64,
    item_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<OrderItem> {
    let mut tx = state.pool.begin().await?;
    let order = db::orders::lock(&mut tx, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::with_message(
            ErrorCode::IllegalTransition,
            "Cannot pick items of a cancelled order",
        )
        .into());
    }

    if !db::orders::pick_item(&mut tx, order_id, item_id, now).await? {
        let exists = db::orders::items(&mut *tx, order_id)
            .await?
            .iter()
            .any(|i| i.id == item_id);
        let code = if exists {
            ErrorCode::ItemAlreadyPicked
        } else {
            ErrorCode::OrderItemNotFound
        };
        return Err(AppError::new(code).with_detail("item_id", item_id).into());
    }
    let item = db::orders::items(&mut *tx, order_id)
        .await?
        .into_iter()
        .find(|i| i.id == item_id)
        .ok_or_else(|| AppError::new(ErrorCode::OrderItemNotFound))?;
    tx.commit().await?;

    tracing::info!(order_id, item_id, supplier_id = ?item.supplier_id, "Order item picked");
    Ok(item)
}

/// A salesperson reports an offline payment for review
pub async fn file_verification(
    state: &AppState,
    order_id: i64,
    sales: &Identity,
    voucher_url: Option<&str>,
    remark: Option<&str>,
) -> ServiceResult<PaymentVerificationRequest> {
    let code = sales.require_code()?;
    let order = reload(state, order_id).await?;
    match order.status {
        OrderStatus::Paid => return Err(AppError::new(ErrorCode::OrderAlreadyPaid).into()),
        OrderStatus::Cancelled => {
            return Err(
                AppError::with_message(ErrorCode::IllegalTransition, "Order is cancelled").into(),
            );
        }
        _ => {}
    }

    let id = match db::verifications::insert(&state.pool, order_id, code, voucher_url, remark).await
    {
        Ok(id) => id,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::new(ErrorCode::VerificationPending)
                .with_detail("order_id", order_id)
                .into());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(order_id, verification_id = id, employee_code = %code, "Payment verification filed");

    Ok(db::verifications::get(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VerificationNotFound))?)
}

async fn review(
    state: &AppState,
    id: i64,
    reviewer: &Identity,
    decision: VerificationStatus,
    reject_reason: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<PaymentVerificationRequest> {
    let mut tx = state.pool.begin().await?;
    let request = db::verifications::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VerificationNotFound).with_detail("id", id))?;
    if request.status != VerificationStatus::Pending {
        return Err(AppError::new(ErrorCode::VerificationAlreadyReviewed)
            .with_detail("status", request.status.as_str())
            .into());
    }

    if decision == VerificationStatus::Approved {
        let order = db::orders::lock(&mut tx, request.order_id)
            .await?
            .ok_or_else(|| order_not_found(request.order_id))?;
        settlement::mark_paid(&mut tx, &order, state.zone, now).await?;
    }
    let operator = reviewer.operator();
    db::verifications::review(&mut tx, id, decision, &operator, reject_reason, now).await?;
    tx.commit().await?;

    tracing::info!(
        verification_id = id,
        order_id = request.order_id,
        decision = decision.as_str(),
        reviewer = %operator,
        "Payment verification reviewed"
    );
    Ok(db::verifications::get(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VerificationNotFound))?)
}

/// Approve: delivered → paid and settlement
pub async fn approve_verification(
    state: &AppState,
    id: i64,
    reviewer: &Identity,
    now: DateTime<Utc>,
) -> ServiceResult<PaymentVerificationRequest> {
    review(state, id, reviewer, VerificationStatus::Approved, None, now).await
}

pub async fn reject_verification(
    state: &AppState,
    id: i64,
    reviewer: &Identity,
    reason: &str,
    now: DateTime<Utc>,
) -> ServiceResult<PaymentVerificationRequest> {
    if reason.trim().is_empty() {
        return Err(AppError::validation("A reject reason is required").into());
    }
    review(state, id, reviewer, VerificationStatus::Rejected, Some(reason), now).await
}

/// Refund status carried by a refund callback
pub fn refund_outcome(refund_status: &str) -> Option<RefundStatus> {
    match refund_status.to_ascii_uppercase().as_str() {
        "SUCCESS" => Some(RefundStatus::Success),
        "PROCESSING" => None,
        _ => Some(RefundStatus::Failed),
    }
}

/// Apply a refund callback; replays and late callbacks change nothing
pub async fn refund_notify(state: &AppState, notify: &RefundNotify) -> ServiceResult<()> {
    let Some(outcome) = refund_outcome(&notify.refund_status) else {
        return Ok(());
    };
    let mut tx = state.pool.begin().await?;
    let order = db::orders::lock_by_number(&mut tx, &notify.out_trade_no)
        .await?
        .ok_or_else(|| order_not_found(&notify.out_trade_no))?;

    if matches!(order.refund_status, RefundStatus::Success | RefundStatus::Failed) {
        tracing::debug!(order_id = order.id, "Refund already final");
        return Ok(());
    }
    db::orders::set_refund(&mut tx, order.id, outcome, Some(&notify.refund_id)).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = order.id,
        refund_id = %notify.refund_id,
        status = outcome.as_str(),
        "Refund settled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_callback_states() {
        assert_eq!(refund_outcome("SUCCESS"), Some(RefundStatus::Success));
        assert_eq!(refund_outcome("success"), Some(RefundStatus::Success));
        assert_eq!(refund_outcome("PROCESSING"), None);
        assert_eq!(refund_outcome("ABNORMAL"), Some(RefundStatus::Failed));
        assert_eq!(refund_outcome("CLOSED"), Some(RefundStatus::Failed));
    }
}
