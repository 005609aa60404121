//! Checkout composition
//!
//! Turns purchase-list lines into a fully priced `OrderDraft`: items are
//! re-read from the current catalog, priced, then discounted by coupons.
//! Persisting the draft is the repository's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::{
    FeeBreakdown, OrderFlags, PaymentMethod, UserCoupon, UserType, WeatherTag,
};
use std::collections::{HashMap, HashSet};

use crate::coupons::{self, AppliedCoupons, CouponChoice, CouponOrderView};
use crate::pricing::{
    self, ExclusionRule, FeeContext, FeeError, FeeItem, FeeParameters, FreeShippingBlocker,
    round_money,
};

/// Purchase-list row selected for checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PurchaseListLine {
    pub id: i64,
    pub product_id: i64,
    pub spec_name: String,
    pub quantity: i32,
}

/// Current catalog state of one product spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSku {
    pub product_id: i64,
    pub product_name: String,
    pub spec_name: String,
    pub category_ids: Vec<i64>,
    pub supplier_id: Option<i64>,
    pub cost_price: Decimal,
    pub wholesale_price: Decimal,
    pub retail_price: Decimal,
    pub delivery_weight: Decimal,
    pub exclusion: Option<ExclusionRule>,
    pub is_deleted: bool,
}

pub type Catalog = HashMap<(i64, String), CatalogSku>;

/// Frozen order line before it has an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    pub product_id: i64,
    pub product_name: String,
    pub spec_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub subtotal: Decimal,
    pub supplier_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutInput {
    pub user_id: i64,
    pub address_id: i64,
    pub user_type: UserType,
    pub payment_method: PaymentMethod,
    pub flags: OrderFlags,
    pub weather: WeatherTag,
    pub points_discount: Decimal,
    pub coupon_choice: Option<CouponChoice>,
    pub remark: Option<String>,
}

/// A priced order ready to be inserted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub user_id: i64,
    pub address_id: i64,
    pub payment_method: PaymentMethod,
    pub flags: OrderFlags,
    pub weather_tag: WeatherTag,
    pub items: Vec<DraftItem>,
    pub breakdown: FeeBreakdown,
    pub coupons: AppliedCoupons,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<FreeShippingBlocker>,
    pub goods_amount: Decimal,
    pub delivery_fee: Decimal,
    pub urgent_fee: Decimal,
    pub points_discount: Decimal,
    pub coupon_discount: Decimal,
    pub total_amount: Decimal,
    pub purchase_list_item_ids: Vec<i64>,
    pub remark: Option<String>,
}

/// `max(0, goods + delivery + urgent - points - coupons)`
pub fn compose_total(
    goods_amount: Decimal,
    delivery_fee: Decimal,
    urgent_fee: Decimal,
    points_discount: Decimal,
    coupon_discount: Decimal,
) -> Decimal {
    (goods_amount + delivery_fee + urgent_fee - points_discount - coupon_discount)
        .max(Decimal::ZERO)
}

/// Re-read every line from the catalog
pub fn materialize(
    lines: &[PurchaseListLine],
    catalog: &Catalog,
    user_type: UserType,
    payment_method: PaymentMethod,
) -> Result<Vec<(FeeItem, DraftItem)>, FeeError> {
    lines
        .iter()
        .map(|line| {
            let sku = catalog
                .get(&(line.product_id, line.spec_name.clone()))
                .filter(|s| !s.is_deleted)
                .ok_or_else(|| FeeError::InvalidItem {
                    product_id: line.product_id,
                    reason: format!("spec '{}' is no longer available", line.spec_name),
                })?;
            if payment_method == PaymentMethod::Online && sku.cost_price <= Decimal::ZERO {
                return Err(FeeError::InvalidItem {
                    product_id: line.product_id,
                    reason: "no cost price for online payment".into(),
                });
            }
            let fee_item = FeeItem {
                product_id: sku.product_id,
                category_ids: sku.category_ids.clone(),
                supplier_id: sku.supplier_id,
                quantity: line.quantity,
                cost_price: sku.cost_price,
                wholesale_price: sku.wholesale_price,
                retail_price: sku.retail_price,
                delivery_weight: sku.delivery_weight,
                exclusion: sku.exclusion,
            };
            let unit_price = fee_item.unit_price(user_type);
            let draft = DraftItem {
                product_id: sku.product_id,
                product_name: sku.product_name.clone(),
                spec_name: sku.spec_name.clone(),
                quantity: line.quantity,
                unit_price,
                cost_price: sku.cost_price,
                subtotal: round_money(unit_price * Decimal::from(line.quantity)),
                supplier_id: sku.supplier_id,
            };
            Ok((fee_item, draft))
        })
        .collect()
}

/// Price, discount and total a checkout
pub fn build_draft(
    input: &CheckoutInput,
    lines: &[PurchaseListLine],
    catalog: &Catalog,
    wallet: &[UserCoupon],
    params: &FeeParameters,
    now: DateTime<Utc>,
) -> Result<OrderDraft, AppError> {
    if input.points_discount < Decimal::ZERO {
        return Err(AppError::validation("points_discount must not be negative"));
    }

    let materialized = materialize(lines, catalog, input.user_type, input.payment_method)?;
    let (fee_items, items): (Vec<_>, Vec<_>) = materialized.into_iter().unzip();

    let ctx = FeeContext {
        user_type: input.user_type,
        payment_method: input.payment_method,
        is_urgent: input.flags.is_urgent,
        is_isolated: input.flags.is_isolated,
        weather: input.weather,
    };
    let quote = pricing::calculate(&fee_items, &ctx, params)?;
    let breakdown = quote.breakdown;

    let view = CouponOrderView {
        goods_amount: breakdown.goods_amount,
        customer_delivery_fee: breakdown.customer_delivery_fee,
        category_ids: fee_items
            .iter()
            .flat_map(|i| i.category_ids.iter().copied())
            .collect::<HashSet<_>>(),
    };
    let applied = coupons::select(wallet, input.coupon_choice, &view, now)?;

    let points_discount = round_money(input.points_discount);
    let coupon_discount = applied.coupon_discount();
    let total_amount = compose_total(
        breakdown.goods_amount,
        breakdown.customer_delivery_fee,
        breakdown.customer_urgent_fee,
        points_discount,
        coupon_discount,
    );

    Ok(OrderDraft {
        user_id: input.user_id,
        address_id: input.address_id,
        payment_method: input.payment_method,
        flags: input.flags,
        weather_tag: input.weather,
        items,
        goods_amount: breakdown.goods_amount,
        delivery_fee: breakdown.customer_delivery_fee,
        urgent_fee: breakdown.customer_urgent_fee,
        points_discount,
        coupon_discount,
        total_amount,
        breakdown,
        coupons: applied,
        blockers: quote.blockers,
        purchase_list_item_ids: lines.iter().map(|l| l.id).collect(),
        remark: input.remark.clone(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use shared::error::ErrorCode;
    use shared::models::{Coupon, CouponKind, UserCouponStatus};

    fn params() -> FeeParameters {
        FeeParameters {
            base_fee: dec!(5),
            item_rate_high: dec!(0.3),
            item_max_count: dec!(20),
            profit_threshold: dec!(10),
            max_profit_share: dec!(5),
            ..Default::default()
        }
    }

    fn sku(product_id: i64, cost: Decimal, retail: Decimal) -> CatalogSku {
        CatalogSku {
            product_id,
            product_name: format!("product {product_id}"),
            spec_name: "box".into(),
            category_ids: vec![3],
            supplier_id: Some(11),
            cost_price: cost,
            wholesale_price: dec!(0),
            retail_price: retail,
            delivery_weight: dec!(1),
            exclusion: None,
            is_deleted: false,
        }
    }

    fn catalog() -> Catalog {
        [sku(1, dec!(3), dec!(5)), sku(2, dec!(2), dec!(4))]
            .into_iter()
            .map(|s| ((s.product_id, s.spec_name.clone()), s))
            .collect()
    }

    fn lines() -> Vec<PurchaseListLine> {
        vec![
            PurchaseListLine {
                id: 101,
                product_id: 1,
                spec_name: "box".into(),
                quantity: 2,
            },
            PurchaseListLine {
                id: 102,
                product_id: 2,
                spec_name: "box".into(),
                quantity: 3,
            },
        ]
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn amount_coupon(id: i64, value: Decimal) -> UserCoupon {
        UserCoupon {
            id,
            user_id: 1,
            coupon: Coupon {
                id,
                name: "off".into(),
                kind: CouponKind::Amount,
                discount_value: value,
                min_amount: dec!(0),
                category_ids: vec![],
                total_count: 0,
                used_count: 0,
                valid_from: now() - Duration::days(1),
                valid_to: now() + Duration::days(1),
                is_active: true,
            },
            status: UserCouponStatus::Issued,
            expires_at: now() + Duration::days(1),
            order_id: None,
        }
    }

    pub(crate) fn sample_draft() -> OrderDraft {
        let input = CheckoutInput {
            user_id: 1,
            address_id: 5,
            ..Default::default()
        };
        build_draft(&input, &lines(), &catalog(), &[], &params(), now())
            .expect("sample draft")
    }

    #[test]
    fn draft_totals_follow_the_fee_breakdown() {
        let d = sample_draft();
        assert_eq!(d.goods_amount, dec!(22));
        assert_eq!(d.delivery_fee, dec!(3));
        assert_eq!(d.total_amount, dec!(25));
        assert_eq!(d.items.len(), 2);
        assert_eq!(d.items[1].subtotal, dec!(12.00));
        assert_eq!(d.items[0].supplier_id, Some(11));
        assert_eq!(d.purchase_list_item_ids, vec![101, 102]);
    }

    #[test]
    fn coupons_reduce_the_total() {
        let input = CheckoutInput {
            user_id: 1,
            address_id: 5,
            ..Default::default()
        };
        let wallet = [amount_coupon(9, dec!(4))];
        let d = build_draft(&input, &lines(), &catalog(), &wallet, &params(), now()).unwrap();
        assert_eq!(d.coupon_discount, dec!(4));
        assert_eq!(d.total_amount, dec!(21));
        assert_eq!(d.coupons.amount_coupon_id(), Some(9));
    }

    #[test]
    fn total_never_goes_negative() {
        assert_eq!(
            compose_total(dec!(10), dec!(3), dec!(0), dec!(8), dec!(10)),
            dec!(0)
        );
        assert_eq!(
            compose_total(dec!(10), dec!(3), dec!(2), dec!(1), dec!(4)),
            dec!(10)
        );
    }

    #[test]
    fn deleted_sku_is_invalid() {
        let mut cat = catalog();
        if let Some(s) = cat.get_mut(&(2, "box".to_string())) {
            s.is_deleted = true;
        }
        let input = CheckoutInput::default();
        let err = build_draft(&input, &lines(), &cat, &[], &params(), now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidItem);
    }

    #[test]
    fn online_zero_cost_is_invalid() {
        let mut cat = catalog();
        if let Some(s) = cat.get_mut(&(1, "box".to_string())) {
            s.cost_price = dec!(0);
        }
        let input = CheckoutInput {
            payment_method: PaymentMethod::Online,
            ..Default::default()
        };
        let err = build_draft(&input, &lines(), &cat, &[], &params(), now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidItem);
    }

    #[test]
    fn empty_selection_is_an_empty_cart() {
        let err = build_draft(&CheckoutInput::default(), &[], &catalog(), &[], &params(), now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyCart);
    }

    #[test]
    fn negative_points_are_rejected() {
        let input = CheckoutInput {
            points_discount: dec!(-1),
            ..Default::default()
        };
        let err = build_draft(&input, &lines(), &catalog(), &[], &params(), now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
