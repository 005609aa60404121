//! coupons / user_coupons tables

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{Coupon, CouponKind, UserCoupon, UserCouponStatus};
use sqlx::MySqlConnection;
use sqlx::types::Json;

use super::{BoxError, placeholders};

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: i64,
    user_id: i64,
    status: String,
    expires_at: DateTime<Utc>,
    order_id: Option<i64>,
    coupon_id: i64,
    name: String,
    kind: String,
    discount_value: Decimal,
    min_amount: Decimal,
    category_ids: Option<Json<Vec<i64>>>,
    total_count: i32,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    is_active: bool,
}

impl WalletRow {
    fn into_user_coupon(self) -> Result<UserCoupon, BoxError> {
        let kind = CouponKind::from_db(&self.kind)
            .ok_or_else(|| format!("coupon {} has unknown kind {}", self.coupon_id, self.kind))?;
        let status = UserCouponStatus::from_db(&self.status)
            .ok_or_else(|| format!("user coupon {} has unknown status {}", self.id, self.status))?;
        Ok(UserCoupon {
            id: self.id,
            user_id: self.user_id,
            status,
            expires_at: self.expires_at,
            order_id: self.order_id,
            coupon: Coupon {
                id: self.coupon_id,
                name: self.name,
                kind,
                discount_value: self.discount_value,
                min_amount: self.min_amount,
                category_ids: self.category_ids.map(|j| j.0).unwrap_or_default(),
                total_count: self.total_count,
                used_count: self.used_count,
                valid_from: self.valid_from,
                valid_to: self.valid_to,
                is_active: self.is_active,
            },
        })
    }
}

const WALLET_SELECT: &str = r#"
    SELECT uc.id, uc.user_id, uc.status, uc.expires_at, uc.order_id,
           c.id AS coupon_id, c.name, c.kind, c.discount_value, c.min_amount,
           c.category_ids, c.total_count, c.used_count, c.valid_from, c.valid_to, c.is_active
    FROM user_coupons uc
    JOIN coupons c ON c.id = uc.coupon_id
"#;

/// Issued and reserved coupons of a user, locked for the checkout transaction
pub async fn wallet(conn: &mut MySqlConnection, user_id: i64) -> Result<Vec<UserCoupon>, BoxError> {
    let sql = format!(
        "{WALLET_SELECT} WHERE uc.user_id = ? AND uc.status IN ('issued', 'reserved') ORDER BY uc.id FOR UPDATE"
    );
    let rows: Vec<WalletRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(conn).await?;
    rows.into_iter().map(WalletRow::into_user_coupon).collect()
}

/// Given user coupons, locked
pub async fn lock_many(
    conn: &mut MySqlConnection,
    ids: &[i64],
) -> Result<Vec<UserCoupon>, BoxError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "{WALLET_SELECT} WHERE uc.id IN ({}) ORDER BY uc.id FOR UPDATE",
        placeholders(ids.len())
    );
    let mut query = sqlx::query_as::<_, WalletRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(conn).await?;
    rows.into_iter().map(WalletRow::into_user_coupon).collect()
}

/// Move a user coupon between states, guarded on its current state
///
/// Returns false when the row was no longer in `from`.
pub async fn set_status(
    conn: &mut MySqlConnection,
    id: i64,
    from: UserCouponStatus,
    to: UserCouponStatus,
    order_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE user_coupons
        SET status = ?, order_id = ?, used_at = CASE WHEN ? = 'used' THEN ? ELSE NULL END
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(order_id)
    .bind(to.as_str())
    .bind(now)
    .bind(id)
    .bind(from.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Count one more use of a template, bounded by its total
///
/// Returns false when the template was already full.
pub async fn increment_used(conn: &mut MySqlConnection, coupon_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE coupons SET used_count = used_count + 1
        WHERE id = ? AND (total_count = 0 OR used_count < total_count)
        "#,
    )
    .bind(coupon_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn decrement_used(conn: &mut MySqlConnection, coupon_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE coupons SET used_count = used_count - 1 WHERE id = ? AND used_count > 0")
        .bind(coupon_id)
        .execute(conn)
        .await?;
    Ok(())
}
