//! commission_configs / sales_commissions tables

use rust_decimal::Decimal;
use shared::models::{CommissionConfig, CommissionTier, SalesCommission};
use sqlx::{MySqlConnection, MySqlPool};

use super::placeholders;
use crate::commission::TierAdjustment;
use crate::orders::settlement::CommissionEntry;

#[derive(sqlx::FromRow)]
struct ConfigRow {
    employee_code: String,
    base_rate: Decimal,
    new_customer_bonus_rate: Decimal,
    tier1_threshold: Decimal,
    tier1_rate: Decimal,
    tier2_threshold: Decimal,
    tier2_rate: Decimal,
    tier3_threshold: Decimal,
    tier3_rate: Decimal,
    min_profit_threshold: Decimal,
}

impl From<ConfigRow> for CommissionConfig {
    fn from(r: ConfigRow) -> Self {
        let tier = |threshold, rate| CommissionTier { threshold, rate };
        CommissionConfig {
            employee_code: r.employee_code,
            base_rate: r.base_rate,
            new_customer_bonus_rate: r.new_customer_bonus_rate,
            tiers: [
                tier(r.tier1_threshold, r.tier1_rate),
                tier(r.tier2_threshold, r.tier2_rate),
                tier(r.tier3_threshold, r.tier3_rate),
            ],
            min_profit_threshold: r.min_profit_threshold,
        }
    }
}

/// Stored config, or the defaults when none exists
pub async fn config_or_default<'c, E>(
    executor: E,
    employee_code: &str,
) -> Result<CommissionConfig, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    let row: Option<ConfigRow> = sqlx::query_as(
        r#"
        SELECT employee_code, base_rate, new_customer_bonus_rate,
               tier1_threshold, tier1_rate, tier2_threshold, tier2_rate,
               tier3_threshold, tier3_rate, min_profit_threshold
        FROM commission_configs WHERE employee_code = ?
        "#,
    )
    .bind(employee_code)
    .fetch_optional(executor)
    .await?;
    Ok(row
        .map(CommissionConfig::from)
        .unwrap_or_else(|| CommissionConfig::default_for(employee_code)))
}

pub async fn upsert_config(pool: &MySqlPool, c: &CommissionConfig) -> Result<(), sqlx::Error> {
    let [t1, t2, t3] = c.tiers;
    sqlx::query(
        r#"
        INSERT INTO commission_configs (
            employee_code, base_rate, new_customer_bonus_rate,
            tier1_threshold, tier1_rate, tier2_threshold, tier2_rate,
            tier3_threshold, tier3_rate, min_profit_threshold
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            base_rate = VALUES(base_rate),
            new_customer_bonus_rate = VALUES(new_customer_bonus_rate),
            tier1_threshold = VALUES(tier1_threshold), tier1_rate = VALUES(tier1_rate),
            tier2_threshold = VALUES(tier2_threshold), tier2_rate = VALUES(tier2_rate),
            tier3_threshold = VALUES(tier3_threshold), tier3_rate = VALUES(tier3_rate),
            min_profit_threshold = VALUES(min_profit_threshold)
        "#,
    )
    .bind(&c.employee_code)
    .bind(c.base_rate)
    .bind(c.new_customer_bonus_rate)
    .bind(t1.threshold)
    .bind(t1.rate)
    .bind(t2.threshold)
    .bind(t2.rate)
    .bind(t3.threshold)
    .bind(t3.rate)
    .bind(c.min_profit_threshold)
    .execute(pool)
    .await?;
    Ok(())
}

const COMMISSION_SELECT: &str = r#"
    SELECT id, order_id, order_number, employee_code, user_id, order_amount, goods_cost,
           delivery_cost, profit, base_commission, new_customer_bonus, tier_commission,
           total_commission, tier_level, is_valid_order, is_new_customer_order,
           calculation_month, settlement_date, is_accounted, is_settled,
           is_accounted_cancelled, created_at
    FROM sales_commissions
"#;

/// A salesperson's rows for a month; `lock` takes them FOR UPDATE
pub async fn month_rows(
    conn: &mut MySqlConnection,
    employee_code: &str,
    month: &str,
    lock: bool,
) -> Result<Vec<SalesCommission>, sqlx::Error> {
    let sql = format!(
        "{COMMISSION_SELECT} WHERE employee_code = ? AND calculation_month = ? ORDER BY id{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as(&sql)
        .bind(employee_code)
        .bind(month)
        .fetch_all(conn)
        .await
}

pub async fn list(
    pool: &MySqlPool,
    employee_code: Option<&str>,
    month: Option<&str>,
) -> Result<Vec<SalesCommission>, sqlx::Error> {
    let sql = format!(
        "{COMMISSION_SELECT} WHERE (? IS NULL OR employee_code = ?) AND (? IS NULL OR calculation_month = ?) ORDER BY settlement_date DESC, id DESC"
    );
    sqlx::query_as(&sql)
        .bind(employee_code)
        .bind(employee_code)
        .bind(month)
        .bind(month)
        .fetch_all(pool)
        .await
}

pub async fn by_order(
    conn: &mut MySqlConnection,
    order_id: i64,
) -> Result<Option<SalesCommission>, sqlx::Error> {
    let sql = format!("{COMMISSION_SELECT} WHERE order_id = ? FOR UPDATE");
    sqlx::query_as(&sql).bind(order_id).fetch_optional(conn).await
}

/// Insert a commission row; false if the order already has one
pub async fn insert(conn: &mut MySqlConnection, e: &CommissionEntry) -> Result<bool, sqlx::Error> {
    let r = &e.result;
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO sales_commissions (
            order_id, order_number, employee_code, user_id, order_amount, goods_cost,
            delivery_cost, profit, base_commission, new_customer_bonus, tier_commission,
            total_commission, tier_level, is_valid_order, is_new_customer_order,
            calculation_month, settlement_date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(e.order_id)
    .bind(&e.order_number)
    .bind(&e.employee_code)
    .bind(e.user_id)
    .bind(e.input.order_amount)
    .bind(e.input.goods_cost)
    .bind(e.input.delivery_cost)
    .bind(r.profit)
    .bind(r.base_commission)
    .bind(r.new_customer_bonus)
    .bind(r.tier_commission)
    .bind(r.total_commission)
    .bind(i32::from(r.applied_tier))
    .bind(r.is_valid_order)
    .bind(e.input.is_new_customer_order)
    .bind(&e.calculation_month)
    .bind(e.settlement_date)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete(conn: &mut MySqlConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sales_commissions WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_cancelled(conn: &mut MySqlConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sales_commissions SET is_accounted_cancelled = TRUE WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Accounting flag changes applied by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingAction {
    Account,
    Settle,
    CancelAccount,
}

impl AccountingAction {
    fn update_sql(self) -> &'static str {
        match self {
            Self::Account => {
                "UPDATE sales_commissions SET is_accounted = TRUE WHERE is_accounted_cancelled = FALSE AND id IN"
            }
            Self::Settle => {
                "UPDATE sales_commissions SET is_settled = TRUE WHERE is_accounted = TRUE AND is_accounted_cancelled = FALSE AND id IN"
            }
            Self::CancelAccount => {
                "UPDATE sales_commissions SET is_accounted = FALSE WHERE is_settled = FALSE AND id IN"
            }
        }
    }
}

pub async fn apply_accounting(
    pool: &MySqlPool,
    action: AccountingAction,
    ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("{} ({})", action.update_sql(), placeholders(ids.len()));
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    Ok(query.execute(pool).await?.rows_affected())
}

pub async fn apply_adjustments(
    conn: &mut MySqlConnection,
    adjustments: &[TierAdjustment],
) -> Result<(), sqlx::Error> {
    for a in adjustments {
        sqlx::query(
            "UPDATE sales_commissions SET tier_level = ?, tier_commission = ?, total_commission = ? WHERE id = ?",
        )
        .bind(i32::from(a.tier_level))
        .bind(a.tier_commission)
        .bind(a.total_commission)
        .bind(a.id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
