//! Commission Calculator
//!
//! Sales commission for one settled order, monthly tier recalculation and
//! the reversal rule applied when a settled order is cancelled.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{CommissionConfig, CommissionMonthlyStats, SalesCommission};
use thiserror::Error;

use crate::pricing::round_money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommissionError {
    #[error("invalid commission config: {0}")]
    InvalidConfig(&'static str),
    #[error("invalid month {0}, expected YYYY-MM")]
    InvalidMonth(String),
}

impl From<CommissionError> for AppError {
    fn from(e: CommissionError) -> Self {
        match e {
            CommissionError::InvalidConfig(_) => {
                AppError::with_message(ErrorCode::CommissionConfigInvalid, e.to_string())
            }
            CommissionError::InvalidMonth(_) => AppError::validation(e.to_string()),
        }
    }
}

/// Validate a config before it is stored
pub fn validate_config(config: &CommissionConfig) -> Result<(), CommissionError> {
    let unit = |r: Decimal| r >= Decimal::ZERO && r <= Decimal::ONE;
    if config.employee_code.trim().is_empty() {
        return Err(CommissionError::InvalidConfig("employee_code is required"));
    }
    if !unit(config.base_rate) || !unit(config.new_customer_bonus_rate) {
        return Err(CommissionError::InvalidConfig("rates must be within [0, 1]"));
    }
    if config
        .tiers
        .iter()
        .any(|t| !unit(t.rate) || t.threshold < Decimal::ZERO)
    {
        return Err(CommissionError::InvalidConfig(
            "tier thresholds must be >= 0 and rates within [0, 1]",
        ));
    }
    if config.tiers.windows(2).any(|w| w[0].threshold > w[1].threshold) {
        return Err(CommissionError::InvalidConfig(
            "tier thresholds must be ascending",
        ));
    }
    if config.min_profit_threshold < Decimal::ZERO {
        return Err(CommissionError::InvalidConfig(
            "min_profit_threshold must be >= 0",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionInput {
    pub order_amount: Decimal,
    pub goods_cost: Decimal,
    pub delivery_cost: Decimal,
    pub is_new_customer_order: bool,
    /// Sales already recorded this month, excluding this order
    pub month_to_date_sales: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub profit: Decimal,
    pub base_commission: Decimal,
    pub new_customer_bonus: Decimal,
    pub tier_commission: Decimal,
    pub total_commission: Decimal,
    /// 0 when no tier threshold is reached
    pub applied_tier: u8,
    pub is_valid_order: bool,
}

/// Highest tier whose threshold `volume` reaches
pub fn tier_for(volume: Decimal, config: &CommissionConfig) -> (u8, Decimal) {
    let mut tiers = config.tiers;
    tiers.sort_by(|a, b| a.threshold.cmp(&b.threshold));
    tiers
        .iter()
        .enumerate()
        .rev()
        .find(|(_, t)| volume >= t.threshold)
        .map(|(rank, t)| (rank as u8 + 1, t.rate))
        .unwrap_or((0, Decimal::ZERO))
}

pub fn calculate(input: &CommissionInput, config: &CommissionConfig) -> CommissionBreakdown {
    let profit = input.order_amount - input.goods_cost - input.delivery_cost;
    if profit < config.min_profit_threshold {
        return CommissionBreakdown {
            profit: round_money(profit),
            ..Default::default()
        };
    }

    let base_commission = round_money(profit * config.base_rate);
    let new_customer_bonus = if input.is_new_customer_order {
        round_money(profit * config.new_customer_bonus_rate)
    } else {
        Decimal::ZERO
    };
    let (applied_tier, rate) = tier_for(input.month_to_date_sales + input.order_amount, config);
    let tier_commission = round_money(profit * rate);
    let total_commission =
        (base_commission + new_customer_bonus + tier_commission).max(Decimal::ZERO);

    CommissionBreakdown {
        profit: round_money(profit),
        base_commission,
        new_customer_bonus,
        tier_commission,
        total_commission,
        applied_tier,
        is_valid_order: true,
    }
}

/// YYYY-MM of `at` in the regional zone
pub fn calculation_month(at: DateTime<Utc>, zone: FixedOffset) -> String {
    at.with_timezone(&zone).format("%Y-%m").to_string()
}

/// Validate a YYYY-MM query parameter
pub fn parse_month(month: &str) -> Result<String, CommissionError> {
    let valid = month.len() == 7
        && chrono::NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_ok();
    if valid {
        Ok(month.to_string())
    } else {
        Err(CommissionError::InvalidMonth(month.to_string()))
    }
}

/// Sum of valid, uncancelled sales among `rows`
pub fn month_volume(rows: &[SalesCommission]) -> Decimal {
    rows.iter()
        .filter(|r| r.is_valid_order && !r.is_accounted_cancelled)
        .map(|r| r.order_amount)
        .sum()
}

/// New tier figures for one commission row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierAdjustment {
    pub id: i64,
    pub tier_level: u8,
    pub tier_commission: Decimal,
    pub total_commission: Decimal,
}

/// Recompute tier commission for a month from its final volume
///
/// Only rows whose figures change are returned.
pub fn recalculate_month(rows: &[SalesCommission], config: &CommissionConfig) -> Vec<TierAdjustment> {
    let (tier_level, rate) = tier_for(month_volume(rows), config);
    rows.iter()
        .filter(|r| r.is_valid_order && !r.is_accounted_cancelled)
        .filter_map(|r| {
            let tier_commission = round_money(r.profit * rate);
            let total_commission = (r.base_commission + r.new_customer_bonus + tier_commission)
                .max(Decimal::ZERO);
            let changed = tier_commission != r.tier_commission
                || i32::from(tier_level) != r.tier_level;
            changed.then_some(TierAdjustment {
                id: r.id,
                tier_level,
                tier_commission,
                total_commission,
            })
        })
        .collect()
}

pub fn monthly_stats(
    employee_code: &str,
    month: &str,
    rows: &[SalesCommission],
) -> CommissionMonthlyStats {
    let live: Vec<_> = rows.iter().filter(|r| !r.is_accounted_cancelled).collect();
    CommissionMonthlyStats {
        employee_code: employee_code.to_string(),
        month: month.to_string(),
        order_count: live.len() as i64,
        valid_order_count: live.iter().filter(|r| r.is_valid_order).count() as i64,
        new_customer_count: live.iter().filter(|r| r.is_new_customer_order).count() as i64,
        total_sales: live.iter().map(|r| r.order_amount).sum(),
        total_profit: live.iter().map(|r| r.profit).sum(),
        total_commission: live.iter().map(|r| r.total_commission).sum(),
        settled_commission: live
            .iter()
            .filter(|r| r.is_settled)
            .map(|r| r.total_commission)
            .sum(),
    }
}

/// What happens to a commission row when its order is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reversal {
    Delete,
    MarkCancelled,
    /// Already reversed
    Keep,
}

pub fn reversal_for(row: &SalesCommission) -> Reversal {
    if row.is_accounted_cancelled {
        Reversal::Keep
    } else if row.is_accounted || row.is_settled {
        Reversal::MarkCancelled
    } else {
        Reversal::Delete
    }
}

#[cfg(test)]
mod tests;
