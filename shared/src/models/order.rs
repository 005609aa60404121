//! Order Model

use super::fee::{FeeBreakdown, WeatherTag};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status
///
/// Legacy inputs `pending` and `shipped` parse into `PendingDelivery` and
/// `Delivered`; only the canonical names are ever written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingDelivery,
    Delivering,
    Delivered,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingDelivery => "pending_delivery",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

/// Unrecognized status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_delivery" | "pending" => Ok(Self::PendingDelivery),
            "delivering" => Ok(Self::Delivering),
            "delivered" | "shipped" => Ok(Self::Delivered),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer settles the order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    /// Cash (or later transfer) on delivery
    #[default]
    Cod,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Cod => "cod",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "online" => Self::Online,
            _ => Self::Cod,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    None,
    Processing,
    Success,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "processing" => Self::Processing,
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::None,
        }
    }
}

/// Customer-facing order flags chosen at checkout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFlags {
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub trust_receipt: bool,
    #[serde(default)]
    pub hide_price: bool,
    #[serde(default)]
    pub require_phone_contact: bool,
    #[serde(default)]
    pub is_isolated: bool,
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub address_id: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub goods_amount: Decimal,
    /// Customer-visible delivery fee
    pub delivery_fee: Decimal,
    pub urgent_fee: Decimal,
    pub points_discount: Decimal,
    pub coupon_discount: Decimal,
    pub total_amount: Decimal,
    pub delivery_fee_calculation: FeeBreakdown,
    #[serde(flatten)]
    pub flags: OrderFlags,
    pub weather_tag: Option<WeatherTag>,
    pub wechat_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub settlement_date: Option<DateTime<Utc>>,
    pub delivery_fee_settled: bool,
    pub order_profit: Decimal,
    pub net_profit: Decimal,
    pub refund_status: RefundStatus,
    pub refund_id: Option<String>,
    pub delivery_employee_code: Option<String>,
    pub delivery_coupon_id: Option<i64>,
    pub amount_coupon_id: Option<i64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_settled(&self) -> bool {
        self.settlement_date.is_some()
    }

    /// Reserved or consumed user coupons attached to this order
    pub fn coupon_ids(&self) -> Vec<i64> {
        self.delivery_coupon_id
            .into_iter()
            .chain(self.amount_coupon_id)
            .collect()
    }
}

/// Frozen order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub spec_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub subtotal: Decimal,
    pub is_picked: bool,
    pub supplier_id: Option<i64>,
}

/// Display row for rider income views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DeliveryIncomeRow {
    pub order_id: i64,
    pub order_number: String,
    pub status: String,
    pub rider_payable_fee: Decimal,
    pub delivery_fee_settled: bool,
    pub settlement_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Rider income totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryIncomeStats {
    pub settled_fee: Decimal,
    pub unsettled_fee: Decimal,
    pub total_fee: Decimal,
    pub order_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Salesperson request to mark an order paid offline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerificationRequest {
    pub id: i64,
    pub order_id: i64,
    pub sales_code: String,
    pub status: VerificationStatus,
    pub voucher_url: Option<String>,
    pub remark: Option<String>,
    pub reject_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Batch settlement request for rider delivery fees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettleRequest {
    pub employee_code: String,
    #[serde(default)]
    pub order_ids: Vec<i64>,
    pub settlement_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_statuses_normalize() {
        assert_eq!(
            "pending".parse::<OrderStatus>().unwrap(),
            OrderStatus::PendingDelivery
        );
        assert_eq!(
            "shipped".parse::<OrderStatus>().unwrap(),
            OrderStatus::Delivered
        );
        assert_eq!(OrderStatus::PendingDelivery.as_str(), "pending_delivery");
        assert!("pending_payment".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serde_never_writes_legacy_names() {
        let s: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"pending_delivery\"");
        let s: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"delivered\"");
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
    }
}
