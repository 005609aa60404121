//! Settlement Orchestrator planning
//!
//! Decides what settling, completing or cancelling an order must do. The
//! repository executes the plan inside the order's row-locked transaction;
//! each step is guarded by a marker on the order so replays are no-ops.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use shared::models::{CommissionConfig, Order, OrderStatus, PaymentMethod};

use super::status::{self, OrderAction, TransitionError};
use crate::commission::{self, CommissionBreakdown, CommissionInput};

/// Result of a "mark paid" request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidDecision {
    /// Already paid and settled
    AlreadySettled,
    /// Move delivered → paid and run settlement
    Settle,
}

pub fn decide_mark_paid(order: &Order) -> Result<PaidDecision, TransitionError> {
    if order.status == OrderStatus::Paid {
        return Ok(PaidDecision::AlreadySettled);
    }
    status::apply(order.status, OrderAction::MarkPaid)?;
    Ok(PaidDecision::Settle)
}

/// Result of a rider completing delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletePlan {
    pub next: OrderStatus,
    /// Prepaid orders go straight on to paid
    pub settle: bool,
}

pub fn plan_complete(order: &Order) -> Result<CompletePlan, TransitionError> {
    let delivered = status::apply(order.status, OrderAction::Complete)?;
    if order.paid_at.is_some() {
        Ok(CompletePlan {
            next: OrderStatus::Paid,
            settle: true,
        })
    } else {
        Ok(CompletePlan {
            next: delivered,
            settle: false,
        })
    }
}

/// Whether cancelling this order must return money through the gateway
pub fn needs_refund(order: &Order) -> bool {
    order.paid_at.is_some()
        && order.total_amount > Decimal::ZERO
        && (order.payment_method == PaymentMethod::Online
            || order.wechat_transaction_id.is_some())
}

/// Work to do when an order is cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelPlan {
    /// reserved/used → issued
    pub restore_coupon_ids: Vec<i64>,
    /// Refund of the captured total
    pub refund_amount: Option<Decimal>,
    /// Commission rows to reverse
    pub reverse_commission: bool,
}

pub fn plan_cancel(order: &Order) -> Result<CancelPlan, TransitionError> {
    status::apply(order.status, OrderAction::Cancel)?;
    Ok(CancelPlan {
        restore_coupon_ids: order.coupon_ids(),
        refund_amount: needs_refund(order).then_some(order.total_amount),
        reverse_commission: order.is_settled() || order.paid_at.is_some(),
    })
}

/// Commission inputs taken from the frozen order
///
/// Delivery cost is the rider payable fee, never the customer fee.
pub fn commission_input(
    order: &Order,
    is_new_customer_order: bool,
    month_to_date_sales: Decimal,
) -> CommissionInput {
    CommissionInput {
        order_amount: order.total_amount,
        goods_cost: order.delivery_fee_calculation.goods_cost,
        delivery_cost: order.delivery_fee_calculation.rider_payable_fee,
        is_new_customer_order,
        month_to_date_sales,
    }
}

/// A commission row ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionEntry {
    pub order_id: i64,
    pub order_number: String,
    pub employee_code: String,
    pub user_id: i64,
    pub input: CommissionInput,
    pub result: CommissionBreakdown,
    pub calculation_month: String,
    pub settlement_date: DateTime<Utc>,
}

pub fn commission_entry(
    order: &Order,
    config: &CommissionConfig,
    is_new_customer_order: bool,
    month_to_date_sales: Decimal,
    settled_at: DateTime<Utc>,
    zone: FixedOffset,
) -> CommissionEntry {
    let input = commission_input(order, is_new_customer_order, month_to_date_sales);
    CommissionEntry {
        order_id: order.id,
        order_number: order.order_number.clone(),
        employee_code: config.employee_code.clone(),
        user_id: order.user_id,
        result: commission::calculate(&input, config),
        input,
        calculation_month: commission::calculation_month(settled_at, zone),
        settlement_date: settled_at,
    }
}

/// `(order_profit, net_profit)` recorded at settlement
///
/// Order profit is goods margin; net profit further deducts the rider
/// payable fee, customer discounts and the commission paid out.
pub fn profits(order: &Order, commission_total: Decimal) -> (Decimal, Decimal) {
    let fb = &order.delivery_fee_calculation;
    let order_profit = order.goods_amount - fb.goods_cost;
    let net_profit = order.total_amount - fb.goods_cost - fb.rider_payable_fee - commission_total;
    (order_profit, net_profit)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use shared::models::{FeeBreakdown, OrderFlags, RefundStatus};

    pub(crate) fn order(status: OrderStatus) -> Order {
        Order {
            id: 1,
            order_number: "P202506011200000001123456".into(),
            user_id: 7,
            address_id: 3,
            status,
            payment_method: PaymentMethod::Cod,
            goods_amount: dec!(600),
            delivery_fee: dec!(3),
            urgent_fee: dec!(0),
            points_discount: dec!(0),
            coupon_discount: dec!(3),
            total_amount: dec!(600),
            delivery_fee_calculation: FeeBreakdown {
                goods_cost: dec!(300),
                rider_payable_fee: dec!(100),
                customer_delivery_fee: dec!(3),
                ..Default::default()
            },
            flags: OrderFlags::default(),
            weather_tag: None,
            wechat_transaction_id: None,
            paid_at: None,
            settlement_date: None,
            delivery_fee_settled: false,
            order_profit: dec!(0),
            net_profit: dec!(0),
            refund_status: RefundStatus::None,
            refund_id: None,
            delivery_employee_code: None,
            delivery_coupon_id: Some(4),
            amount_coupon_id: None,
            remark: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn mark_paid_is_idempotent() {
        assert_eq!(
            decide_mark_paid(&order(OrderStatus::Delivered)),
            Ok(PaidDecision::Settle)
        );
        assert_eq!(
            decide_mark_paid(&order(OrderStatus::Paid)),
            Ok(PaidDecision::AlreadySettled)
        );
        assert!(decide_mark_paid(&order(OrderStatus::Delivering)).is_err());
        assert!(decide_mark_paid(&order(OrderStatus::Cancelled)).is_err());
    }

    #[test]
    fn prepaid_orders_settle_on_completion() {
        let mut o = order(OrderStatus::Delivering);
        assert_eq!(
            plan_complete(&o),
            Ok(CompletePlan {
                next: OrderStatus::Delivered,
                settle: false
            })
        );
        o.paid_at = Some(o.created_at);
        assert_eq!(
            plan_complete(&o),
            Ok(CompletePlan {
                next: OrderStatus::Paid,
                settle: true
            })
        );
        assert!(plan_complete(&order(OrderStatus::PendingDelivery)).is_err());
    }

    #[test]
    fn cancel_releases_coupons_and_refunds_prepaid() {
        let o = order(OrderStatus::PendingDelivery);
        let plan = plan_cancel(&o).unwrap();
        assert_eq!(plan.restore_coupon_ids, vec![4]);
        assert_eq!(plan.refund_amount, None);

        let mut o = order(OrderStatus::Delivering);
        o.payment_method = PaymentMethod::Online;
        o.paid_at = Some(o.created_at);
        let plan = plan_cancel(&o).unwrap();
        assert_eq!(plan.refund_amount, Some(dec!(600)));
        assert!(plan.reverse_commission);

        assert!(plan_cancel(&order(OrderStatus::Delivered)).is_err());
        assert!(plan_cancel(&order(OrderStatus::Cancelled)).is_err());
    }

    #[test]
    fn zero_total_needs_no_refund() {
        let mut o = order(OrderStatus::PendingDelivery);
        o.payment_method = PaymentMethod::Online;
        o.paid_at = Some(o.created_at);
        o.total_amount = dec!(0);
        assert!(!needs_refund(&o));
        // cash order later paid online
        let mut o = order(OrderStatus::PendingDelivery);
        o.paid_at = Some(o.created_at);
        o.wechat_transaction_id = Some("wx1".into());
        assert!(needs_refund(&o));
    }

    #[test]
    fn commission_uses_rider_payable_fee() {
        let o = order(OrderStatus::Delivered);
        let input = commission_input(&o, true, dec!(9500));
        assert_eq!(input.order_amount, dec!(600));
        assert_eq!(input.goods_cost, dec!(300));
        assert_eq!(input.delivery_cost, dec!(100));
        assert_ne!(input.delivery_cost, o.delivery_fee);
    }

    #[test]
    fn commission_entry_matches_tier_scenario() {
        let o = order(OrderStatus::Delivered);
        let mut cfg = CommissionConfig::default_for("S001");
        cfg.base_rate = dec!(0.05);
        cfg.new_customer_bonus_rate = dec!(0.02);
        cfg.tiers[0].threshold = dec!(5000);
        cfg.tiers[0].rate = dec!(0.02);
        cfg.tiers[1].threshold = dec!(10000);
        cfg.tiers[1].rate = dec!(0.03);
        cfg.tiers[2].threshold = dec!(20000);
        cfg.tiers[2].rate = dec!(0.04);
        cfg.min_profit_threshold = dec!(10);
        let zone = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 18, 0, 0).unwrap();

        let entry = commission_entry(&o, &cfg, true, dec!(9500), at, zone);
        assert_eq!(entry.result.total_commission, dec!(20));
        assert_eq!(entry.calculation_month, "2025-07");

        // same inputs, same outputs
        assert_eq!(entry, commission_entry(&o, &cfg, true, dec!(9500), at, zone));
    }

    #[test]
    fn profits_deduct_rider_pay_and_commission() {
        let o = order(OrderStatus::Delivered);
        let (order_profit, net_profit) = profits(&o, dec!(20));
        assert_eq!(order_profit, dec!(300));
        assert_eq!(net_profit, dec!(180));
    }
}
