//! payment_verifications table

use chrono::{DateTime, Utc};
use shared::models::{PaymentVerificationRequest, VerificationStatus};
use sqlx::{MySqlConnection, MySqlPool};

use super::BoxError;

#[derive(sqlx::FromRow)]
struct VerificationRow {
    id: i64,
    order_id: i64,
    sales_code: String,
    status: String,
    voucher_url: Option<String>,
    remark: Option<String>,
    reject_reason: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<VerificationRow> for PaymentVerificationRequest {
    type Error = BoxError;

    fn try_from(r: VerificationRow) -> Result<Self, Self::Error> {
        let status = VerificationStatus::from_db(&r.status)
            .ok_or_else(|| format!("verification {} has unknown status {}", r.id, r.status))?;
        Ok(PaymentVerificationRequest {
            id: r.id,
            order_id: r.order_id,
            sales_code: r.sales_code,
            status,
            voucher_url: r.voucher_url,
            remark: r.remark,
            reject_reason: r.reject_reason,
            reviewed_by: r.reviewed_by,
            reviewed_at: r.reviewed_at,
            created_at: r.created_at,
        })
    }
}

const SELECT: &str = r#"
    SELECT id, order_id, sales_code, status, voucher_url, remark, reject_reason,
           reviewed_by, reviewed_at, created_at
    FROM payment_verifications
"#;

/// Insert a pending request; the unique pending index rejects a second one
pub async fn insert(
    pool: &MySqlPool,
    order_id: i64,
    sales_code: &str,
    voucher_url: Option<&str>,
    remark: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO payment_verifications (order_id, sales_code, status, voucher_url, remark) VALUES (?, ?, 'pending', ?, ?)",
    )
    .bind(order_id)
    .bind(sales_code)
    .bind(voucher_url)
    .bind(remark)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn get(pool: &MySqlPool, id: i64) -> Result<Option<PaymentVerificationRequest>, BoxError> {
    let sql = format!("{SELECT} WHERE id = ?");
    let row: Option<VerificationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.map(PaymentVerificationRequest::try_from).transpose()
}

pub async fn lock(
    conn: &mut MySqlConnection,
    id: i64,
) -> Result<Option<PaymentVerificationRequest>, BoxError> {
    let sql = format!("{SELECT} WHERE id = ? FOR UPDATE");
    let row: Option<VerificationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(PaymentVerificationRequest::try_from).transpose()
}

pub async fn review(
    conn: &mut MySqlConnection,
    id: i64,
    status: VerificationStatus,
    reviewer: &str,
    reject_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE payment_verifications
        SET status = ?, reviewed_by = ?, reject_reason = ?, reviewed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(reviewer)
    .bind(reject_reason)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}
