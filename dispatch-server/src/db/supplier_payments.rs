//! supplier_payments / supplier_payment_items tables

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::models::{
    CreateSupplierPayment, PayableLine, SupplierPayment, SupplierPaymentItem,
    SupplierPaymentStatus,
};
use sqlx::{MySqlConnection, MySqlPool};

use super::placeholders;

/// Picked lines of live orders, each with the active payment covering it
const PAYABLE_SELECT: &str = r#"
    SELECT oi.id AS order_item_id, oi.order_id, o.order_number, oi.supplier_id,
           oi.product_id, oi.product_name, oi.spec_name, oi.quantity, oi.cost_price,
           spi.payment_id
    FROM order_items oi
    JOIN orders o ON o.id = oi.order_id
    LEFT JOIN supplier_payment_items spi
           ON spi.order_item_id = oi.id AND spi.is_active = TRUE
    WHERE oi.is_picked = TRUE AND o.status <> 'cancelled'
"#;

/// Lines requested for a payment, row-locked
pub async fn lock_payable_lines(
    conn: &mut MySqlConnection,
    order_item_ids: &[i64],
) -> Result<Vec<PayableLine>, sqlx::Error> {
    if order_item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "{PAYABLE_SELECT} AND oi.id IN ({}) ORDER BY oi.id FOR UPDATE",
        placeholders(order_item_ids.len())
    );
    let mut query = sqlx::query_as::<_, PayableLine>(&sql);
    for id in order_item_ids {
        query = query.bind(id);
    }
    query.fetch_all(conn).await
}

pub async fn supplier_lines(
    pool: &MySqlPool,
    supplier_id: i64,
) -> Result<Vec<PayableLine>, sqlx::Error> {
    let sql = format!("{PAYABLE_SELECT} AND oi.supplier_id = ? ORDER BY oi.id");
    sqlx::query_as(&sql).bind(supplier_id).fetch_all(pool).await
}

pub async fn all_lines(pool: &MySqlPool) -> Result<Vec<PayableLine>, sqlx::Error> {
    let sql = format!("{PAYABLE_SELECT} AND oi.supplier_id IS NOT NULL ORDER BY oi.supplier_id, oi.id");
    sqlx::query_as(&sql).fetch_all(pool).await
}

/// Insert the header and one child per line
pub async fn insert(
    conn: &mut MySqlConnection,
    req: &CreateSupplierPayment,
    lines: &[&PayableLine],
    created_by: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO supplier_payments (
            supplier_id, payment_date, amount, payment_method, payment_account, remark,
            created_by, status
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(req.supplier_id)
    .bind(req.payment_date)
    .bind(req.amount)
    .bind(&req.payment_method)
    .bind(req.payment_account.as_deref())
    .bind(req.remark.as_deref())
    .bind(created_by)
    .bind(SupplierPaymentStatus::Active.as_str())
    .execute(&mut *conn)
    .await?;
    let payment_id = result.last_insert_id() as i64;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO supplier_payment_items (
                payment_id, order_id, order_item_id, product_id, product_name, spec_name,
                quantity, cost_price, subtotal, is_active
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(payment_id)
        .bind(line.order_id)
        .bind(line.order_item_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.spec_name)
        .bind(line.quantity)
        .bind(line.cost_price)
        .bind(line.amount())
        .execute(&mut *conn)
        .await?;
    }
    Ok(payment_id)
}

#[derive(sqlx::FromRow)]
struct HeaderRow {
    id: i64,
    supplier_id: i64,
    payment_date: NaiveDate,
    amount: Decimal,
    payment_method: String,
    payment_account: Option<String>,
    remark: Option<String>,
    created_by: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<HeaderRow> for SupplierPayment {
    fn from(r: HeaderRow) -> Self {
        SupplierPayment {
            id: r.id,
            supplier_id: r.supplier_id,
            payment_date: r.payment_date,
            amount: r.amount,
            payment_method: r.payment_method,
            payment_account: r.payment_account,
            remark: r.remark,
            created_by: r.created_by,
            status: SupplierPaymentStatus::from_db(&r.status),
            created_at: r.created_at,
            items: Vec::new(),
        }
    }
}

const HEADER_SELECT: &str = r#"
    SELECT id, supplier_id, payment_date, amount, payment_method, payment_account, remark,
           created_by, status, created_at
    FROM supplier_payments
"#;

pub async fn get(pool: &MySqlPool, id: i64) -> Result<Option<SupplierPayment>, sqlx::Error> {
    let sql = format!("{HEADER_SELECT} WHERE id = ?");
    let header: Option<HeaderRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    let Some(header) = header else {
        return Ok(None);
    };
    let mut payment = SupplierPayment::from(header);
    payment.items = sqlx::query_as::<_, SupplierPaymentItem>(
        r#"
        SELECT id, payment_id, order_id, order_item_id, product_id, product_name, spec_name,
               quantity, cost_price, subtotal
        FROM supplier_payment_items WHERE payment_id = ? ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(Some(payment))
}

pub async fn list(
    pool: &MySqlPool,
    supplier_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SupplierPayment>, i64), sqlx::Error> {
    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM supplier_payments WHERE (? IS NULL OR supplier_id = ?)")
            .bind(supplier_id)
            .bind(supplier_id)
            .fetch_one(pool)
            .await?;
    let sql = format!(
        "{HEADER_SELECT} WHERE (? IS NULL OR supplier_id = ?) ORDER BY payment_date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows: Vec<HeaderRow> = sqlx::query_as(&sql)
        .bind(supplier_id)
        .bind(supplier_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok((rows.into_iter().map(SupplierPayment::from).collect(), total))
}

/// Lock a header; None when absent
pub async fn lock_status(
    conn: &mut MySqlConnection,
    id: i64,
) -> Result<Option<SupplierPaymentStatus>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT status FROM supplier_payments WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|(s,)| SupplierPaymentStatus::from_db(&s)))
}

/// Deactivate a payment; its lines return to pending
pub async fn cancel(conn: &mut MySqlConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_payments SET status = ? WHERE id = ?")
        .bind(SupplierPaymentStatus::Cancelled.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE supplier_payment_items SET is_active = FALSE WHERE payment_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
