//! Order creation: cash-on-delivery checkout, online prepay and the
//! payment callback that materializes a prepaid order

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderFlags, OrderItem, OrderStatus, PaymentMethod, WeatherTag};
use sqlx::MySqlConnection;

use super::{order_not_found, settlement};
use crate::coupons::{self, CouponChoice, CouponError, CouponEvent};
use crate::db::{self, orders::CapturedPayment};
use crate::error::{ServiceError, ServiceResult};
use crate::orders::{self, CheckoutInput, OrderDraft, PrepayEntry, number};
use crate::payment::{PayNotify, PrepayHandshake, PrepayRequest};
use crate::pricing::{self, FeeParameters};
use crate::state::AppState;

/// Weather at the delivery address, as reported by the client
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherReport {
    pub condition: String,
    pub temperature: Decimal,
}

/// Body of `POST /cart/orders` and `POST /prepay`
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub flags: OrderFlags,
    /// Empty checks out the whole purchase list
    #[serde(default)]
    pub purchase_list_item_ids: Vec<i64>,
    #[serde(default)]
    pub coupons: Option<CouponChoice>,
    #[serde(default)]
    pub weather: Option<WeatherReport>,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrepayResponse {
    pub out_trade_no: String,
    pub total_amount: Decimal,
    pub expires_at: DateTime<Utc>,
    pub handshake: PrepayHandshake,
    pub draft: OrderDraft,
}

/// Resolve the customer, weather and isolation into a checkout input
async fn checkout_input(
    state: &AppState,
    user_id: i64,
    req: &CheckoutRequest,
    params: &FeeParameters,
) -> ServiceResult<CheckoutInput> {
    let customer = db::users::find_customer(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {user_id}")))?;
    let point = db::users::address_point(&state.pool, user_id, req.address_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Address {}", req.address_id)))?;

    let mut flags = req.flags;
    if let (false, Some(target)) = (flags.is_isolated, point) {
        let batch = db::users::pending_batch_points(&state.pool, req.address_id).await?;
        flags.is_isolated = pricing::classify_isolated(params, target, &batch);
    }

    let weather = req
        .weather
        .as_ref()
        .map(|w| WeatherTag::classify(&w.condition, w.temperature, params.extreme_temp))
        .unwrap_or_default();

    Ok(CheckoutInput {
        user_id,
        address_id: req.address_id,
        user_type: customer.user_type,
        payment_method: req.payment_method,
        flags,
        weather,
        // points redemption is handled outside this service
        points_discount: Decimal::ZERO,
        coupon_choice: req.coupons,
        remark: req.remark.clone(),
    })
}

/// Read the purchase list, catalog and wallet and price the checkout
async fn price_draft(
    conn: &mut MySqlConnection,
    input: &CheckoutInput,
    line_ids: &[i64],
    params: &FeeParameters,
    lock: bool,
    now: DateTime<Utc>,
) -> ServiceResult<OrderDraft> {
    let lines = db::catalog::purchase_lines(conn, input.user_id, line_ids, lock).await?;
    if !line_ids.is_empty() && lines.len() != line_ids.len() {
        let found: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let missing: Vec<i64> = line_ids
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect();
        return Err(AppError::new(ErrorCode::PurchaseListItemNotFound)
            .with_detail("missing", serde_json::json!(missing))
            .into());
    }

    let mut product_ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let catalog = db::catalog::load_catalog(conn, &product_ids).await?;
    let wallet = db::coupons::wallet(conn, input.user_id).await?;
    Ok(orders::build_draft(input, &lines, &catalog, &wallet, params, now)?)
}

/// How a coupon that can no longer be reserved is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    /// Fail the checkout
    Strict,
    /// Money was already captured at the discounted total; keep the order
    /// without the coupon
    BestEffort,
}

/// Insert the order, reserve its coupons and clear the purchase list
///
/// Only coupons actually reserved are written on the order row.
async fn persist_draft(
    conn: &mut MySqlConnection,
    order_number: &str,
    draft: &OrderDraft,
    payment: Option<&CapturedPayment>,
    reservation: Reservation,
    now: DateTime<Utc>,
) -> ServiceResult<i64> {
    let locked = db::coupons::lock_many(conn, &draft.coupons.user_coupon_ids()).await?;
    let mut draft = draft.clone();
    let dropped = coupons::retain_reservable(&mut draft.coupons, &locked);
    if let Some(&first) = dropped.first() {
        match reservation {
            Reservation::Strict => {
                return Err(match locked.iter().find(|c| c.id == first) {
                    Some(c) => CouponError::AlreadyReserved(c.kind()),
                    None => CouponError::NotFound(first),
                }
                .into());
            }
            Reservation::BestEffort => tracing::warn!(
                order_number,
                user_coupon_ids = ?dropped,
                "Coupons no longer reservable, paid order keeps its captured total"
            ),
        }
    }

    let order_id = db::orders::insert_from_draft(conn, order_number, &draft, payment).await?;

    let kept = draft.coupons.user_coupon_ids();
    for c in locked.iter().filter(|c| kept.contains(&c.id)) {
        let to = coupons::next_status(c.id, c.status, CouponEvent::Reserve)?;
        let moved = match db::coupons::set_status(conn, c.id, c.status, to, Some(order_id), now).await
        {
            Ok(moved) => moved,
            Err(e) if db::is_unique_violation(&e) => false,
            Err(e) => return Err(e.into()),
        };
        if !moved {
            return Err(CouponError::AlreadyReserved(c.kind()).into());
        }
    }

    db::catalog::delete_purchase_lines(conn, draft.user_id, &draft.purchase_list_item_ids).await?;
    Ok(order_id)
}

async fn load_created(state: &AppState, order_id: i64) -> ServiceResult<CreatedOrder> {
    let order = db::orders::get(&state.pool, order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    let items = db::orders::items(&state.pool, order_id).await?;
    Ok(CreatedOrder { order, items })
}

/// Create a cash-on-delivery order from the purchase list in one transaction
pub async fn create_cod_order(
    state: &AppState,
    user_id: i64,
    req: &CheckoutRequest,
    now: DateTime<Utc>,
) -> ServiceResult<CreatedOrder> {
    if req.payment_method == PaymentMethod::Online {
        return Err(AppError::with_message(
            ErrorCode::PaymentInvalidMethod,
            "Online orders are created through /prepay",
        )
        .into());
    }
    let params = state.settings.fee_parameters(&state.pool).await?;
    let input = checkout_input(state, user_id, req, &params).await?;

    let mut tx = state.pool.begin().await?;
    let draft = price_draft(&mut tx, &input, &req.purchase_list_item_ids, &params, true, now).await?;
    let order_number = number::generate(now.with_timezone(&state.zone));
    let order_id =
        persist_draft(&mut tx, &order_number, &draft, None, Reservation::Strict, now).await?;
    tx.commit().await?;

    tracing::info!(
        order_id,
        order_number = %order_number,
        user_id,
        total = %draft.total_amount,
        "Order created"
    );
    load_created(state, order_id).await
}

/// Price an online checkout and open a payment with the provider
///
/// Nothing is written to the database; the draft waits in the prepay cache
/// until the callback arrives.
pub async fn prepay(
    state: &AppState,
    user_id: i64,
    req: &CheckoutRequest,
    now: DateTime<Utc>,
) -> ServiceResult<PrepayResponse> {
    if req.payment_method != PaymentMethod::Online {
        return Err(AppError::with_message(
            ErrorCode::PaymentInvalidMethod,
            "Prepay is only available for online payment",
        )
        .into());
    }
    let params = state.settings.fee_parameters(&state.pool).await?;
    let input = checkout_input(state, user_id, req, &params).await?;

    let draft = {
        let mut tx = state.pool.begin().await?;
        let draft =
            price_draft(&mut tx, &input, &req.purchase_list_item_ids, &params, false, now).await?;
        tx.rollback().await?;
        draft
    };
    if draft.total_amount <= Decimal::ZERO {
        return Err(AppError::validation("Nothing to pay online for this order").into());
    }

    let out_trade_no = number::generate(now.with_timezone(&state.zone));
    state.prepay.insert(PrepayEntry {
        out_trade_no: out_trade_no.clone(),
        draft: draft.clone(),
        created_at: now,
    });

    let request = PrepayRequest {
        out_trade_no: out_trade_no.clone(),
        amount: draft.total_amount,
        description: format!("Order {out_trade_no}"),
        payer_id: user_id,
    };
    let handshake = match state.gateway.prepay(&request).await {
        Ok(h) => h,
        Err(e) => {
            state.prepay.remove(&out_trade_no);
            tracing::warn!(out_trade_no = %out_trade_no, error = %e, "Prepay failed");
            return Err(e.into());
        }
    };

    tracing::info!(out_trade_no = %out_trade_no, user_id, total = %draft.total_amount, "Prepay opened");
    Ok(PrepayResponse {
        expires_at: now + state.prepay.ttl(),
        total_amount: draft.total_amount,
        out_trade_no,
        handshake,
        draft,
    })
}

fn amount_mismatch(out_trade_no: &str, expected: Decimal, got: Decimal) -> ServiceError {
    AppError::with_message(
        ErrorCode::AmountMismatch,
        format!("Paid amount {got} does not match order total {expected}"),
    )
    .with_detail("out_trade_no", out_trade_no)
    .into()
}

/// Handle a payment callback; safe to replay
///
/// An existing order (cash-on-delivery paid online) records the capture. A
/// prepaid draft becomes an order with `paid_at` already set.
pub async fn pay_notify(state: &AppState, notify: &PayNotify, now: DateTime<Utc>) -> ServiceResult<()> {
    if !notify.is_success() {
        tracing::info!(
            out_trade_no = %notify.out_trade_no,
            trade_state = %notify.trade_state,
            "Payment not captured"
        );
        return Ok(());
    }
    if !number::is_well_formed(&notify.out_trade_no) {
        return Err(AppError::validation(format!(
            "Malformed out_trade_no {}",
            notify.out_trade_no
        ))
        .into());
    }
    let payment = CapturedPayment {
        transaction_id: notify.transaction_id.clone(),
        paid_at: notify.paid_at.unwrap_or(now),
    };

    let mut tx = state.pool.begin().await?;

    if let Some(order) = db::orders::lock_by_number(&mut tx, &notify.out_trade_no).await? {
        if notify.amount != order.total_amount {
            return Err(amount_mismatch(&notify.out_trade_no, order.total_amount, notify.amount));
        }
        if !db::orders::record_payment(&mut tx, order.id, &payment).await? {
            tracing::debug!(order_id = order.id, "Payment already recorded");
            return Ok(());
        }
        let paid = Order {
            paid_at: Some(payment.paid_at),
            wechat_transaction_id: Some(payment.transaction_id.clone()),
            ..order
        };
        let mut refund = None;
        match paid.status {
            OrderStatus::Cancelled => {
                refund = settlement::claim_refund(
                    &mut tx,
                    &paid,
                    paid.total_amount,
                    "Order cancelled before payment arrived",
                )
                .await?;
            }
            OrderStatus::Delivered => {
                settlement::mark_paid(&mut tx, &paid, state.zone, now).await?;
            }
            // advances to paid when the rider completes delivery
            _ => {}
        }
        tx.commit().await?;
        tracing::info!(order_id = paid.id, status = %paid.status, "Payment recorded");
        if let Some(req) = refund {
            settlement::send_refund(&state.pool, state.gateway.as_ref(), paid.id, &req).await?;
        }
        return Ok(());
    }

    let entry = state.prepay.get(&notify.out_trade_no, now)?;
    if notify.amount != entry.draft.total_amount {
        return Err(amount_mismatch(&notify.out_trade_no, entry.draft.total_amount, notify.amount));
    }

    let created = persist_draft(
        &mut tx,
        &notify.out_trade_no,
        &entry.draft,
        Some(&payment),
        Reservation::BestEffort,
        now,
    )
    .await;
    let order_id = match created {
        Ok(id) => id,
        Err(ServiceError::Db(e))
            if e.downcast_ref::<sqlx::Error>()
                .is_some_and(db::is_unique_violation) =>
        {
            // a concurrent delivery of the same callback won the insert
            tracing::debug!(out_trade_no = %notify.out_trade_no, "Prepaid order already created");
            state.prepay.remove(&notify.out_trade_no);
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    tx.commit().await?;
    state.prepay.remove(&notify.out_trade_no);

    tracing::info!(
        order_id,
        order_number = %notify.out_trade_no,
        total = %entry.draft.total_amount,
        "Prepaid order created"
    );
    Ok(())
}
