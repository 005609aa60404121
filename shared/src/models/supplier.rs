//! Supplier payables models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierPaymentStatus {
    Active,
    Cancelled,
}

impl SupplierPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "cancelled" => Self::Cancelled,
            _ => Self::Active,
        }
    }
}

/// Payment header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierPayment {
    pub id: i64,
    pub supplier_id: i64,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_account: Option<String>,
    pub remark: Option<String>,
    pub created_by: String,
    pub status: SupplierPaymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<SupplierPaymentItem>,
}

/// Payment child row, one per settled order item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SupplierPaymentItem {
    pub id: i64,
    pub payment_id: i64,
    pub order_id: i64,
    pub order_item_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub spec_name: String,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub subtotal: Decimal,
}

/// Create-payment request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupplierPayment {
    pub supplier_id: i64,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_account: Option<String>,
    pub remark: Option<String>,
    pub order_item_ids: Vec<i64>,
}

/// A picked order line as the ledger sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PayableLine {
    pub order_item_id: i64,
    pub order_id: i64,
    pub order_number: String,
    pub supplier_id: Option<i64>,
    pub product_id: i64,
    pub product_name: String,
    pub spec_name: String,
    pub quantity: i32,
    pub cost_price: Decimal,
    /// Active payment covering this line
    pub payment_id: Option<i64>,
}

impl PayableLine {
    pub fn amount(&self) -> Decimal {
        self.cost_price * Decimal::from(self.quantity)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_id.is_some()
    }
}

/// Derived balance for one supplier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierBalance {
    pub supplier_id: i64,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending_amount: Decimal,
    pub item_count: i64,
    pub pending_item_count: i64,
}
