//! Sales commission models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One (threshold, rate) step of the monthly tier ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTier {
    pub threshold: Decimal,
    pub rate: Decimal,
}

/// Per-salesperson commission parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub employee_code: String,
    pub base_rate: Decimal,
    pub new_customer_bonus_rate: Decimal,
    pub tiers: [CommissionTier; 3],
    pub min_profit_threshold: Decimal,
}

impl CommissionConfig {
    /// Defaults applied to a salesperson without a stored config
    pub fn default_for(employee_code: impl Into<String>) -> Self {
        Self {
            employee_code: employee_code.into(),
            base_rate: Decimal::new(45, 2),
            new_customer_bonus_rate: Decimal::new(20, 2),
            tiers: [
                CommissionTier {
                    threshold: Decimal::from(50_000),
                    rate: Decimal::new(5, 2),
                },
                CommissionTier {
                    threshold: Decimal::from(100_000),
                    rate: Decimal::new(10, 2),
                },
                CommissionTier {
                    threshold: Decimal::from(200_000),
                    rate: Decimal::new(20, 2),
                },
            ],
            min_profit_threshold: Decimal::from(5),
        }
    }
}

/// Commission ledger row, one per settled order with a bound salesperson
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SalesCommission {
    pub id: i64,
    pub order_id: i64,
    pub order_number: String,
    pub employee_code: String,
    pub user_id: i64,
    pub order_amount: Decimal,
    pub goods_cost: Decimal,
    pub delivery_cost: Decimal,
    pub profit: Decimal,
    pub base_commission: Decimal,
    pub new_customer_bonus: Decimal,
    pub tier_commission: Decimal,
    pub total_commission: Decimal,
    pub tier_level: i32,
    pub is_valid_order: bool,
    pub is_new_customer_order: bool,
    /// YYYY-MM in the regional zone
    pub calculation_month: String,
    pub settlement_date: DateTime<Utc>,
    pub is_accounted: bool,
    pub is_settled: bool,
    pub is_accounted_cancelled: bool,
    pub created_at: DateTime<Utc>,
}

/// Monthly totals for one salesperson
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CommissionMonthlyStats {
    pub employee_code: String,
    pub month: String,
    pub order_count: i64,
    pub valid_order_count: i64,
    pub new_customer_count: i64,
    pub total_sales: Decimal,
    pub total_profit: Decimal,
    pub total_commission: Decimal,
    pub settled_commission: Decimal,
}
