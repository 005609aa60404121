//! orders / order_items / delivery_logs tables

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::models::{
    DeliveryIncomeRow, DeliveryIncomeStats, FeeBreakdown, Order, OrderFlags, OrderItem,
    OrderStatus, PaymentMethod, RefundStatus, WeatherTag,
};
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool};

use super::{BoxError, placeholders};
use crate::orders::OrderDraft;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    address_id: i64,
    status: String,
    payment_method: String,
    goods_amount: Decimal,
    delivery_fee: Decimal,
    urgent_fee: Decimal,
    points_discount: Decimal,
    coupon_discount: Decimal,
    total_amount: Decimal,
    delivery_fee_calculation: Json<FeeBreakdown>,
    is_urgent: bool,
    trust_receipt: bool,
    hide_price: bool,
    require_phone_contact: bool,
    is_isolated: bool,
    weather_tag: Option<String>,
    wechat_transaction_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    settlement_date: Option<DateTime<Utc>>,
    delivery_fee_settled: bool,
    order_profit: Decimal,
    net_profit: Decimal,
    refund_status: String,
    refund_id: Option<String>,
    delivery_employee_code: Option<String>,
    delivery_coupon_id: Option<i64>,
    amount_coupon_id: Option<i64>,
    remark: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = BoxError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: r.id,
            order_number: r.order_number,
            user_id: r.user_id,
            address_id: r.address_id,
            status: r.status.parse::<OrderStatus>()?,
            payment_method: PaymentMethod::from_db(&r.payment_method),
            goods_amount: r.goods_amount,
            delivery_fee: r.delivery_fee,
            urgent_fee: r.urgent_fee,
            points_discount: r.points_discount,
            coupon_discount: r.coupon_discount,
            total_amount: r.total_amount,
            delivery_fee_calculation: r.delivery_fee_calculation.0,
            flags: OrderFlags {
                is_urgent: r.is_urgent,
                trust_receipt: r.trust_receipt,
                hide_price: r.hide_price,
                require_phone_contact: r.require_phone_contact,
                is_isolated: r.is_isolated,
            },
            weather_tag: r.weather_tag.as_deref().and_then(WeatherTag::from_db),
            wechat_transaction_id: r.wechat_transaction_id,
            paid_at: r.paid_at,
            settlement_date: r.settlement_date,
            delivery_fee_settled: r.delivery_fee_settled,
            order_profit: r.order_profit,
            net_profit: r.net_profit,
            refund_status: RefundStatus::from_db(&r.refund_status),
            refund_id: r.refund_id,
            delivery_employee_code: r.delivery_employee_code,
            delivery_coupon_id: r.delivery_coupon_id,
            amount_coupon_id: r.amount_coupon_id,
            remark: r.remark,
            created_at: r.created_at,
        })
    }
}

const ORDER_SELECT: &str = r#"
    SELECT id, order_number, user_id, address_id, status, payment_method,
           goods_amount, delivery_fee, urgent_fee, points_discount, coupon_discount,
           total_amount, delivery_fee_calculation, is_urgent, trust_receipt, hide_price,
           require_phone_contact, is_isolated, weather_tag, wechat_transaction_id, paid_at,
           settlement_date, delivery_fee_settled, order_profit, net_profit, refund_status,
           refund_id, delivery_employee_code, delivery_coupon_id, amount_coupon_id, remark,
           created_at
    FROM orders
"#;

/// Payment captured before the order row exists
#[derive(Debug, Clone)]
pub struct CapturedPayment {
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
}

/// Insert an order and its lines from a priced draft
pub async fn insert_from_draft(
    conn: &mut MySqlConnection,
    order_number: &str,
    draft: &OrderDraft,
    payment: Option<&CapturedPayment>,
) -> Result<i64, BoxError> {
    let breakdown = draft.breakdown.normalized();
    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            order_number, user_id, address_id, status, payment_method,
            goods_amount, delivery_fee, urgent_fee, points_discount, coupon_discount,
            total_amount, delivery_fee_calculation, is_urgent, trust_receipt, hide_price,
            require_phone_contact, is_isolated, weather_tag, wechat_transaction_id, paid_at,
            delivery_coupon_id, amount_coupon_id, remark
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order_number)
    .bind(draft.user_id)
    .bind(draft.address_id)
    .bind(OrderStatus::PendingDelivery.as_str())
    .bind(draft.payment_method.as_str())
    .bind(draft.goods_amount)
    .bind(draft.delivery_fee)
    .bind(draft.urgent_fee)
    .bind(draft.points_discount)
    .bind(draft.coupon_discount)
    .bind(draft.total_amount)
    .bind(Json(&breakdown))
    .bind(draft.flags.is_urgent)
    .bind(draft.flags.trust_receipt)
    .bind(draft.flags.hide_price)
    .bind(draft.flags.require_phone_contact)
    .bind(draft.flags.is_isolated)
    .bind(draft.weather_tag.as_str())
    .bind(payment.map(|p| p.transaction_id.as_str()))
    .bind(payment.map(|p| p.paid_at))
    .bind(draft.coupons.delivery_coupon_id())
    .bind(draft.coupons.amount_coupon_id())
    .bind(draft.remark.as_deref())
    .execute(&mut *conn)
    .await?;
    let order_id = result.last_insert_id() as i64;

    for item in &draft.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, product_id, product_name, spec_name, quantity,
                unit_price, cost_price, subtotal, is_picked, supplier_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.spec_name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.cost_price)
        .bind(item.subtotal)
        .bind(item.supplier_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(order_id)
}

pub async fn get(pool: &MySqlPool, id: i64) -> Result<Option<Order>, BoxError> {
    let sql = format!("{ORDER_SELECT} WHERE id = ?");
    let row: Option<OrderRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.map(Order::try_from).transpose()
}

/// Row-lock an order for a state change
pub async fn lock(conn: &mut MySqlConnection, id: i64) -> Result<Option<Order>, BoxError> {
    let sql = format!("{ORDER_SELECT} WHERE id = ? FOR UPDATE");
    let row: Option<OrderRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(Order::try_from).transpose()
}

pub async fn lock_by_number(
    conn: &mut MySqlConnection,
    order_number: &str,
) -> Result<Option<Order>, BoxError> {
    let sql = format!("{ORDER_SELECT} WHERE order_number = ? FOR UPDATE");
    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(order_number)
        .fetch_optional(conn)
        .await?;
    row.map(Order::try_from).transpose()
}

pub async fn items<'c, E>(executor: E, order_id: i64) -> Result<Vec<OrderItem>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    sqlx::query_as(
        r#"
        SELECT id, order_id, product_id, product_name, spec_name, quantity,
               unit_price, cost_price, subtotal, is_picked, supplier_id
        FROM order_items WHERE order_id = ? ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await
}

pub async fn set_status(
    conn: &mut MySqlConnection,
    id: i64,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn assign_rider(
    conn: &mut MySqlConnection,
    id: i64,
    employee_code: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET delivery_employee_code = ? WHERE id = ?")
        .bind(employee_code)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn append_delivery_log(
    conn: &mut MySqlConnection,
    order_id: i64,
    employee_code: &str,
    action: &str,
    photo_urls: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO delivery_logs (order_id, employee_code, action, photo_urls) VALUES (?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(employee_code)
    .bind(action)
    .bind((!photo_urls.is_empty()).then_some(Json(photo_urls)))
    .execute(conn)
    .await?;
    Ok(())
}

/// Record a captured payment; a second capture never overwrites the first
pub async fn record_payment(
    conn: &mut MySqlConnection,
    id: i64,
    payment: &CapturedPayment,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET paid_at = ?, wechat_transaction_id = ? WHERE id = ? AND paid_at IS NULL",
    )
    .bind(payment.paid_at)
    .bind(&payment.transaction_id)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Settlement marker; guarded so it is written once
pub async fn mark_settled(
    conn: &mut MySqlConnection,
    id: i64,
    settled_at: DateTime<Utc>,
    order_profit: Decimal,
    net_profit: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET settlement_date = ?, order_profit = ?, net_profit = ?,
            delivery_fee_settled = TRUE,
            delivery_fee_settled_on = COALESCE(delivery_fee_settled_on, DATE(?))
        WHERE id = ? AND settlement_date IS NULL
        "#,
    )
    .bind(settled_at)
    .bind(order_profit)
    .bind(net_profit)
    .bind(settled_at)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_refund(
    conn: &mut MySqlConnection,
    id: i64,
    status: RefundStatus,
    refund_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET refund_status = ?, refund_id = COALESCE(?, refund_id) WHERE id = ?")
        .bind(status.as_str())
        .bind(refund_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Flip `is_picked` once; false when already picked or absent
pub async fn pick_item(
    conn: &mut MySqlConnection,
    order_id: i64,
    item_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE order_items SET is_picked = TRUE, picked_at = ?
        WHERE id = ? AND order_id = ? AND is_picked = FALSE
        "#,
    )
    .bind(now)
    .bind(item_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ── Rider income ──

pub async fn income_stats(
    pool: &MySqlPool,
    employee_code: &str,
) -> Result<DeliveryIncomeStats, sqlx::Error> {
    let (settled, unsettled, count): (Option<Decimal>, Option<Decimal>, i64) = sqlx::query_as(
        r#"
        SELECT
            SUM(CASE WHEN delivery_fee_settled THEN CAST(JSON_UNQUOTE(JSON_EXTRACT(delivery_fee_calculation, '$.rider_payable_fee')) AS DECIMAL(12,2)) END),
            SUM(CASE WHEN NOT delivery_fee_settled THEN CAST(JSON_UNQUOTE(JSON_EXTRACT(delivery_fee_calculation, '$.rider_payable_fee')) AS DECIMAL(12,2)) END),
            COUNT(*)
        FROM orders
        WHERE delivery_employee_code = ? AND status IN ('delivered', 'paid')
        "#,
    )
    .bind(employee_code)
    .fetch_one(pool)
    .await?;
    let settled_fee = settled.unwrap_or_default();
    let unsettled_fee = unsettled.unwrap_or_default();
    Ok(DeliveryIncomeStats {
        settled_fee,
        unsettled_fee,
        total_fee: settled_fee + unsettled_fee,
        order_count: count,
    })
}

pub async fn income_rows(
    pool: &MySqlPool,
    employee_code: &str,
    settled: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<Vec<DeliveryIncomeRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id AS order_id, order_number, status,
               CAST(JSON_UNQUOTE(JSON_EXTRACT(delivery_fee_calculation, '$.rider_payable_fee')) AS DECIMAL(12,2)) AS rider_payable_fee,
               delivery_fee_settled, settlement_date, created_at
        FROM orders
        WHERE delivery_employee_code = ? AND status IN ('delivered', 'paid')
          AND (? IS NULL OR delivery_fee_settled = ?)
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(employee_code)
    .bind(settled)
    .bind(settled)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Batch-mark a rider's delivery fees settled
///
/// An empty `order_ids` covers every eligible order of the rider.
pub async fn settle_delivery_fees(
    pool: &MySqlPool,
    employee_code: &str,
    order_ids: &[i64],
    settlement_date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let mut sql = String::from(
        r#"
        UPDATE orders
        SET delivery_fee_settled = TRUE, delivery_fee_settled_on = ?
        WHERE delivery_employee_code = ? AND status IN ('delivered', 'paid')
          AND delivery_fee_settled = FALSE
        "#,
    );
    if !order_ids.is_empty() {
        sql.push_str(&format!(" AND id IN ({})", placeholders(order_ids.len())));
    }
    let mut query = sqlx::query(&sql).bind(settlement_date).bind(employee_code);
    for id in order_ids {
        query = query.bind(id);
    }
    Ok(query.execute(pool).await?.rows_affected())
}
