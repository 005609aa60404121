//! Fee Calculator
//!
//! Pure function from an order snapshot and `FeeParameters` to a
//! `FeeBreakdown`. Leaf components are rounded to cents; composite fields
//! are summed from the rounded leaves so the breakdown identities hold
//! exactly. Threshold comparisons use the unrounded values.

use super::params::FeeParameters;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{FeeBreakdown, PaymentMethod, UserType, WeatherTag};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Rounding for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

#[inline]
pub(crate) fn round_money(value: Decimal) -> Decimal {
    let mut v = value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(DECIMAL_PLACES);
    v
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("product {product_id} has no cost price")]
    UnpricedSku { product_id: i64 },
    #[error("product {product_id} cannot be ordered: {reason}")]
    InvalidItem { product_id: i64, reason: String },
}

impl From<FeeError> for AppError {
    fn from(e: FeeError) -> Self {
        let message = e.to_string();
        match e {
            FeeError::EmptyCart => AppError::with_message(ErrorCode::EmptyCart, message),
            FeeError::UnpricedSku { product_id } => {
                AppError::with_message(ErrorCode::UnpricedSku, message)
                    .with_detail("product_id", product_id)
            }
            FeeError::InvalidItem { product_id, .. } => {
                AppError::with_message(ErrorCode::InvalidItem, message)
                    .with_detail("product_id", product_id)
            }
        }
    }
}

/// What a delivery-fee exclusion rule targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "item_type", content = "target_id", rename_all = "snake_case")]
pub enum ExclusionScope {
    Product(i64),
    Category(i64),
}

/// Delivery-fee exclusion rule attached to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub scope: ExclusionScope,
    /// Without a minimum the rule is never satisfied
    pub min_quantity_for_free: Option<i32>,
}

/// One cart line as the calculator sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeItem {
    pub product_id: i64,
    /// Own category first, then ancestors
    #[serde(default)]
    pub category_ids: Vec<i64>,
    pub supplier_id: Option<i64>,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub wholesale_price: Decimal,
    pub retail_price: Decimal,
    pub delivery_weight: Decimal,
    pub exclusion: Option<ExclusionRule>,
}

impl FeeItem {
    /// Unit price charged to a customer of `user_type`, never negative
    pub fn unit_price(&self, user_type: UserType) -> Decimal {
        let price = if user_type == UserType::Wholesale && self.wholesale_price > Decimal::ZERO {
            self.wholesale_price
        } else if self.retail_price > Decimal::ZERO {
            self.retail_price
        } else {
            self.cost_price
        };
        price.max(Decimal::ZERO)
    }

    fn weight(&self) -> Decimal {
        if self.delivery_weight > Decimal::ZERO {
            self.delivery_weight
        } else {
            Decimal::ONE
        }
    }
}

/// Order-level inputs besides the items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeContext {
    pub user_type: UserType,
    pub payment_method: PaymentMethod,
    pub is_urgent: bool,
    pub is_isolated: bool,
    pub weather: WeatherTag,
}

/// Exclusion rule that kept the order from shipping free
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeShippingBlocker {
    #[serde(flatten)]
    pub scope: ExclusionScope,
    pub current_quantity: i64,
    pub required_quantity: Option<i32>,
}

/// Calculator output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub breakdown: FeeBreakdown,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<FreeShippingBlocker>,
}

/// Compute the full fee breakdown for a cart
pub fn calculate(
    items: &[FeeItem],
    ctx: &FeeContext,
    params: &FeeParameters,
) -> Result<FeeQuote, FeeError> {
    if items.is_empty() {
        return Err(FeeError::EmptyCart);
    }
    for item in items {
        if item.quantity < 1 {
            return Err(FeeError::InvalidItem {
                product_id: item.product_id,
                reason: format!("quantity {} must be at least 1", item.quantity),
            });
        }
        if ctx.payment_method == PaymentMethod::Online && item.cost_price <= Decimal::ZERO {
            return Err(FeeError::UnpricedSku {
                product_id: item.product_id,
            });
        }
    }

    // Goods
    let mut goods_amount = Decimal::ZERO;
    let mut goods_cost = Decimal::ZERO;
    for item in items {
        let qty = Decimal::from(item.quantity);
        goods_amount += qty * item.unit_price(ctx.user_type);
        goods_cost += qty * item.cost_price.max(Decimal::ZERO);
    }

    // Exclusions
    let category_quantities = category_quantities(items);
    let mut weighted_count = Decimal::ZERO;
    let mut all_excluded_and_satisfied = true;
    let mut blockers: BTreeMap<ExclusionScope, FreeShippingBlocker> = BTreeMap::new();
    for item in items {
        match &item.exclusion {
            None => {
                all_excluded_and_satisfied = false;
                weighted_count += Decimal::from(item.quantity) * item.weight();
            }
            Some(rule) => {
                let current = match rule.scope {
                    ExclusionScope::Product(_) => i64::from(item.quantity),
                    ExclusionScope::Category(id) => {
                        category_quantities.get(&id).copied().unwrap_or_default()
                    }
                };
                let satisfied = rule
                    .min_quantity_for_free
                    .is_some_and(|min| current >= i64::from(min));
                if !satisfied {
                    all_excluded_and_satisfied = false;
                    blockers.entry(rule.scope).or_insert(FreeShippingBlocker {
                        scope: rule.scope,
                        current_quantity: current,
                        required_quantity: rule.min_quantity_for_free,
                    });
                }
            }
        }
    }
    let billable = weighted_count.ceil().min(params.item_max_count);

    // Rider side
    let item_fee_raw = item_fee(billable, params);
    let base_fee = round_money(params.base_fee);
    let isolated_fee = round_money(flag(ctx.is_isolated, params.isolated_subsidy));
    let urgent_fee = round_money(flag(ctx.is_urgent, params.urgent_subsidy));
    let weather_fee = round_money(flag(ctx.weather.is_adverse(), params.weather_subsidy));
    let item_fee = round_money(item_fee_raw);
    let delivery_fee_without_profit = base_fee + isolated_fee + item_fee + urgent_fee + weather_fee;

    let dfwp_raw = params.base_fee
        + flag(ctx.is_isolated, params.isolated_subsidy)
        + item_fee_raw
        + flag(ctx.is_urgent, params.urgent_subsidy)
        + flag(ctx.weather.is_adverse(), params.weather_subsidy);
    let preliminary_profit = goods_amount - goods_cost - dfwp_raw;
    let profit_share = if preliminary_profit > params.profit_threshold {
        round_money(
            ((preliminary_profit - params.profit_threshold) * params.profit_share_rate)
                .min(params.max_profit_share),
        )
    } else {
        Decimal::ZERO
    };
    let rider_payable_fee = delivery_fee_without_profit + profit_share;

    // Customer side
    let is_free_shipping =
        all_excluded_and_satisfied || goods_amount >= params.free_shipping_threshold;
    let customer_delivery_fee = if is_free_shipping {
        Decimal::ZERO
    } else {
        round_money(params.customer_base_fee)
    };
    let customer_urgent_fee = round_money(flag(ctx.is_urgent, params.order_urgent_fee));

    let breakdown = FeeBreakdown {
        base_fee,
        isolated_fee,
        item_fee,
        urgent_fee,
        weather_fee,
        delivery_fee_without_profit,
        profit_share,
        rider_payable_fee,
        total_platform_cost: rider_payable_fee,
        customer_delivery_fee,
        customer_urgent_fee,
        is_free_shipping,
        goods_amount: round_money(goods_amount),
        goods_cost: round_money(goods_cost),
    };

    Ok(FeeQuote {
        breakdown,
        blockers: if is_free_shipping {
            Vec::new()
        } else {
            blockers.into_values().collect()
        },
    })
}

/// Two-tier per-item subsidy; units beyond the high threshold add nothing
pub fn item_fee(count: Decimal, params: &FeeParameters) -> Decimal {
    let low_units = count.min(params.item_threshold_low).max(Decimal::ZERO);
    let high_span = params.item_threshold_high - params.item_threshold_low;
    let high_units = (count - params.item_threshold_low)
        .max(Decimal::ZERO)
        .min(high_span);
    low_units * params.item_rate_low + high_units * params.item_rate_high
}

#[inline]
fn flag(on: bool, amount: Decimal) -> Decimal {
    if on { amount } else { Decimal::ZERO }
}

fn category_quantities(items: &[FeeItem]) -> HashMap<i64, i64> {
    let mut out = HashMap::new();
    for item in items {
        for id in &item.category_ids {
            *out.entry(*id).or_insert(0) += i64::from(item.quantity);
        }
    }
    out
}
