//! Fee parameters
//!
//! Loaded from `system_settings` rows. Every key in the delivery namespace
//! must be recognized; absent keys fall back to defaults.

use rust_decimal::prelude::*;
use shared::error::{AppError, ErrorCode};
use std::str::FromStr;
use thiserror::Error;

pub const KEY_BASE_FEE: &str = "delivery_base_fee";
pub const KEY_ISOLATED_SUBSIDY: &str = "delivery_isolated_subsidy";
pub const KEY_ITEM_THRESHOLD_LOW: &str = "delivery_item_threshold_low";
pub const KEY_ITEM_RATE_LOW: &str = "delivery_item_rate_low";
pub const KEY_ITEM_THRESHOLD_HIGH: &str = "delivery_item_threshold_high";
pub const KEY_ITEM_RATE_HIGH: &str = "delivery_item_rate_high";
pub const KEY_ITEM_MAX_COUNT: &str = "delivery_item_max_count";
pub const KEY_URGENT_SUBSIDY: &str = "delivery_urgent_subsidy";
pub const KEY_ORDER_URGENT_FEE: &str = "order_urgent_fee";
pub const KEY_WEATHER_SUBSIDY: &str = "delivery_weather_subsidy";
pub const KEY_EXTREME_TEMP: &str = "delivery_extreme_temp";
pub const KEY_PROFIT_THRESHOLD: &str = "delivery_profit_threshold";
pub const KEY_PROFIT_SHARE_RATE: &str = "delivery_profit_share_rate";
pub const KEY_MAX_PROFIT_SHARE: &str = "delivery_max_profit_share";
pub const KEY_CUSTOMER_BASE_FEE: &str = "delivery_fee_base";
pub const KEY_FREE_SHIPPING_THRESHOLD: &str = "delivery_fee_free_shipping_threshold";
pub const KEY_ISOLATED_DISTANCE: &str = "delivery_isolated_distance";

/// Every key the loader accepts
pub const RECOGNIZED_KEYS: [&str; 17] = [
    KEY_BASE_FEE,
    KEY_ISOLATED_SUBSIDY,
    KEY_ITEM_THRESHOLD_LOW,
    KEY_ITEM_RATE_LOW,
    KEY_ITEM_THRESHOLD_HIGH,
    KEY_ITEM_RATE_HIGH,
    KEY_ITEM_MAX_COUNT,
    KEY_URGENT_SUBSIDY,
    KEY_ORDER_URGENT_FEE,
    KEY_WEATHER_SUBSIDY,
    KEY_EXTREME_TEMP,
    KEY_PROFIT_THRESHOLD,
    KEY_PROFIT_SHARE_RATE,
    KEY_MAX_PROFIT_SHARE,
    KEY_CUSTOMER_BASE_FEE,
    KEY_FREE_SHIPPING_THRESHOLD,
    KEY_ISOLATED_DISTANCE,
];

/// Whether a settings key belongs to the fee namespace
pub fn is_fee_key(key: &str) -> bool {
    key.starts_with("delivery_") || key == KEY_ORDER_URGENT_FEE
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("unknown fee parameter: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("invalid parameter set: {0}")]
    Inconsistent(&'static str),
}

impl From<ParamError> for AppError {
    fn from(e: ParamError) -> Self {
        let key = match &e {
            ParamError::UnknownKey(k) | ParamError::InvalidValue { key: k, .. } => Some(k.clone()),
            ParamError::Inconsistent(_) => None,
        };
        let err = AppError::with_message(ErrorCode::SettingsInvalid, e.to_string());
        match key {
            Some(k) => err.with_detail("key", k),
            None => err,
        }
    }
}

/// Tunable fee parameters
///
/// Counts and thresholds are kept as `Decimal` so the calculator never
/// mixes numeric types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeParameters {
    pub base_fee: Decimal,
    pub isolated_subsidy: Decimal,
    pub item_threshold_low: Decimal,
    pub item_rate_low: Decimal,
    pub item_threshold_high: Decimal,
    pub item_rate_high: Decimal,
    pub item_max_count: Decimal,
    pub urgent_subsidy: Decimal,
    pub order_urgent_fee: Decimal,
    pub weather_subsidy: Decimal,
    pub extreme_temp: Decimal,
    pub profit_threshold: Decimal,
    pub profit_share_rate: Decimal,
    pub max_profit_share: Decimal,
    pub customer_base_fee: Decimal,
    pub free_shipping_threshold: Decimal,
    /// Kilometres
    pub isolated_distance: Decimal,
}

impl Default for FeeParameters {
    fn default() -> Self {
        Self {
            base_fee: Decimal::from(4),
            isolated_subsidy: Decimal::from(3),
            item_threshold_low: Decimal::from(5),
            item_rate_low: Decimal::new(5, 1),
            item_threshold_high: Decimal::from(10),
            item_rate_high: Decimal::new(6, 1),
            item_max_count: Decimal::from(50),
            urgent_subsidy: Decimal::from(10),
            order_urgent_fee: Decimal::ZERO,
            weather_subsidy: Decimal::ONE,
            extreme_temp: Decimal::from(37),
            profit_threshold: Decimal::from(25),
            profit_share_rate: Decimal::new(8, 2),
            max_profit_share: Decimal::from(50),
            customer_base_fee: Decimal::from(3),
            free_shipping_threshold: Decimal::ONE_HUNDRED,
            isolated_distance: Decimal::from(8),
        }
    }
}

impl FeeParameters {
    /// Build parameters from `(key, value)` settings rows
    ///
    /// Rows outside the fee namespace are ignored. Unknown keys inside it
    /// fail the whole load.
    pub fn from_settings<I, K, V>(rows: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in rows {
            let key = key.as_ref();
            if !is_fee_key(key) {
                continue;
            }
            let slot = params
                .slot_mut(key)
                .ok_or_else(|| ParamError::UnknownKey(key.to_string()))?;
            *slot = Decimal::from_str(value.as_ref().trim()).map_err(|_| {
                ParamError::InvalidValue {
                    key: key.to_string(),
                    value: value.as_ref().to_string(),
                }
            })?;
        }
        params.validate()?;
        Ok(params)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Decimal> {
        let slot = match key {
            KEY_BASE_FEE => &mut self.base_fee,
            KEY_ISOLATED_SUBSIDY => &mut self.isolated_subsidy,
            KEY_ITEM_THRESHOLD_LOW => &mut self.item_threshold_low,
            KEY_ITEM_RATE_LOW => &mut self.item_rate_low,
            KEY_ITEM_THRESHOLD_HIGH => &mut self.item_threshold_high,
            KEY_ITEM_RATE_HIGH => &mut self.item_rate_high,
            KEY_ITEM_MAX_COUNT => &mut self.item_max_count,
            KEY_URGENT_SUBSIDY => &mut self.urgent_subsidy,
            KEY_ORDER_URGENT_FEE => &mut self.order_urgent_fee,
            KEY_WEATHER_SUBSIDY => &mut self.weather_subsidy,
            KEY_EXTREME_TEMP => &mut self.extreme_temp,
            KEY_PROFIT_THRESHOLD => &mut self.profit_threshold,
            KEY_PROFIT_SHARE_RATE => &mut self.profit_share_rate,
            KEY_MAX_PROFIT_SHARE => &mut self.max_profit_share,
            KEY_CUSTOMER_BASE_FEE => &mut self.customer_base_fee,
            KEY_FREE_SHIPPING_THRESHOLD => &mut self.free_shipping_threshold,
            KEY_ISOLATED_DISTANCE => &mut self.isolated_distance,
            _ => return None,
        };
        Some(slot)
    }

    fn validate(&self) -> Result<(), ParamError> {
        if self.item_threshold_low < Decimal::ZERO
            || self.item_threshold_high < self.item_threshold_low
        {
            return Err(ParamError::Inconsistent(
                "item thresholds must satisfy 0 <= low <= high",
            ));
        }
        if self.item_max_count < Decimal::ZERO {
            return Err(ParamError::Inconsistent("item max count must be >= 0"));
        }
        if self.profit_share_rate < Decimal::ZERO || self.max_profit_share < Decimal::ZERO {
            return Err(ParamError::Inconsistent("profit share must be >= 0"));
        }
        Ok(())
    }

    /// Whether an address this far (km) from its nearest same-batch
    /// neighbour counts as isolated
    pub fn is_isolated_distance(&self, nearest_km: f64) -> bool {
        self.isolated_distance
            .to_f64()
            .is_some_and(|limit| limit > 0.0 && nearest_km > limit)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Classify an address against the other addresses waiting in the batch
///
/// An empty batch never marks an order isolated.
pub fn classify_isolated(params: &FeeParameters, target: (f64, f64), batch: &[(f64, f64)]) -> bool {
    batch
        .iter()
        .map(|p| haversine_km(target, *p))
        .min_by(|a, b| a.total_cmp(b))
        .is_some_and(|nearest| params.is_isolated_distance(nearest))
}
