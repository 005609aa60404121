//! Fee breakdown model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer pricing tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Retail,
    Wholesale,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
        }
    }

    /// Unknown stored values fall back to retail pricing
    pub fn from_db(value: &str) -> Self {
        match value {
            "wholesale" => Self::Wholesale,
            _ => Self::Retail,
        }
    }
}

/// Weather classification attached to an order at checkout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherTag {
    #[default]
    Normal,
    Rain,
    Snow,
    ExtremeHeat,
}

impl WeatherTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::ExtremeHeat => "extreme_heat",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "rain" => Some(Self::Rain),
            "snow" => Some(Self::Snow),
            "extreme_heat" => Some(Self::ExtremeHeat),
            _ => None,
        }
    }

    /// Whether the rider weather subsidy applies
    pub fn is_adverse(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Classify a weather report
    ///
    /// Heat wins over precipitation: a hot rainy day is `extreme_heat`.
    pub fn classify(condition: &str, temperature: Decimal, extreme_temp: Decimal) -> Self {
        if temperature >= extreme_temp {
            return Self::ExtremeHeat;
        }
        let condition = condition.to_ascii_lowercase();
        if condition.contains("snow") || condition.contains('雪') {
            Self::Snow
        } else if condition.contains("rain")
            || condition.contains("storm")
            || condition.contains('雨')
        {
            Self::Rain
        } else {
            Self::Normal
        }
    }
}

/// Frozen record of every computed fee component for an order
///
/// Rider side: `rider_payable_fee = delivery_fee_without_profit + profit_share`.
/// Customer side: `customer_delivery_fee` and `customer_urgent_fee`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub base_fee: Decimal,
    pub isolated_fee: Decimal,
    pub item_fee: Decimal,
    pub urgent_fee: Decimal,
    pub weather_fee: Decimal,
    pub delivery_fee_without_profit: Decimal,
    pub profit_share: Decimal,
    pub rider_payable_fee: Decimal,
    pub total_platform_cost: Decimal,
    pub customer_delivery_fee: Decimal,
    pub customer_urgent_fee: Decimal,
    pub is_free_shipping: bool,
    pub goods_amount: Decimal,
    pub goods_cost: Decimal,
}

impl FeeBreakdown {
    /// Rescale every money field to two decimals so stored and recomputed
    /// records compare field by field.
    pub fn normalized(&self) -> Self {
        let n = |d: Decimal| {
            let mut d = d.round_dp(2);
            d.rescale(2);
            d
        };
        Self {
            base_fee: n(self.base_fee),
            isolated_fee: n(self.isolated_fee),
            item_fee: n(self.item_fee),
            urgent_fee: n(self.urgent_fee),
            weather_fee: n(self.weather_fee),
            delivery_fee_without_profit: n(self.delivery_fee_without_profit),
            profit_share: n(self.profit_share),
            rider_payable_fee: n(self.rider_payable_fee),
            total_platform_cost: n(self.total_platform_cost),
            customer_delivery_fee: n(self.customer_delivery_fee),
            customer_urgent_fee: n(self.customer_urgent_fee),
            is_free_shipping: self.is_free_shipping,
            goods_amount: n(self.goods_amount),
            goods_cost: n(self.goods_cost),
        }
    }
}
