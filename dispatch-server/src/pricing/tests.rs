use super::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::models::{PaymentMethod, UserType, WeatherTag};

fn scenario_params() -> FeeParameters {
    FeeParameters {
        base_fee: dec!(5),
        isolated_subsidy: dec!(8),
        item_threshold_low: dec!(5),
        item_rate_low: dec!(0.5),
        item_threshold_high: dec!(10),
        item_rate_high: dec!(0.3),
        item_max_count: dec!(20),
        urgent_subsidy: dec!(4),
        order_urgent_fee: dec!(2),
        weather_subsidy: dec!(3),
        extreme_temp: dec!(37),
        profit_threshold: dec!(10),
        profit_share_rate: dec!(0.08),
        max_profit_share: dec!(5),
        customer_base_fee: dec!(3),
        free_shipping_threshold: dec!(100),
        isolated_distance: dec!(8),
    }
}

fn item(product_id: i64, cost: Decimal, wholesale: Decimal, retail: Decimal, qty: i32) -> FeeItem {
    FeeItem {
        product_id,
        category_ids: vec![],
        supplier_id: Some(1),
        quantity: qty,
        cost_price: cost,
        wholesale_price: wholesale,
        retail_price: retail,
        delivery_weight: Decimal::ONE,
        exclusion: None,
    }
}

fn retail() -> FeeContext {
    FeeContext::default()
}

fn customer_total(b: &shared::models::FeeBreakdown) -> Decimal {
    (b.goods_amount + b.customer_delivery_fee + b.customer_urgent_fee).max(Decimal::ZERO)
}

// ========================================================================
// Literal scenarios
// ========================================================================

#[test]
fn retail_two_items_no_extras() {
    let items = [
        item(1, dec!(3.00), dec!(0), dec!(5.00), 2),
        item(2, dec!(2.00), dec!(0), dec!(4.00), 3),
    ];
    let b = calculate(&items, &retail(), &scenario_params()).unwrap().breakdown;

    assert_eq!(b.goods_amount, dec!(22.00));
    assert_eq!(b.goods_cost, dec!(12.00));
    assert_eq!(b.item_fee, dec!(2.50));
    assert_eq!(b.delivery_fee_without_profit, dec!(7.50));
    assert_eq!(b.profit_share, dec!(0));
    assert_eq!(b.rider_payable_fee, dec!(7.50));
    assert_eq!(b.total_platform_cost, dec!(7.50));
    assert_eq!(b.customer_delivery_fee, dec!(3.00));
    assert!(!b.is_free_shipping);
    assert_eq!(customer_total(&b), dec!(25.00));
}

#[test]
fn wholesale_free_shipping_by_threshold() {
    let items = [item(1, dec!(40), dec!(55), dec!(60), 2)];
    let ctx = FeeContext {
        user_type: UserType::Wholesale,
        ..Default::default()
    };
    let b = calculate(&items, &ctx, &scenario_params()).unwrap().breakdown;

    assert_eq!(b.goods_amount, dec!(110.00));
    assert!(b.is_free_shipping);
    assert_eq!(b.customer_delivery_fee, dec!(0));
    // rider side is unaffected by free shipping
    assert_eq!(b.base_fee, dec!(5));
    assert_eq!(b.item_fee, dec!(1.00));
    assert_eq!(b.delivery_fee_without_profit, dec!(6.00));
    // 110 - 80 - 6 = 24 > 10 => (24 - 10) * 0.08 = 1.12
    assert_eq!(b.profit_share, dec!(1.12));
    assert_eq!(b.rider_payable_fee, dec!(7.12));
}

#[test]
fn isolated_urgent_rain() {
    let items = [item(1, dec!(10), dec!(0), dec!(30), 1)];
    let ctx = FeeContext {
        is_isolated: true,
        is_urgent: true,
        weather: WeatherTag::Rain,
        ..Default::default()
    };
    let b = calculate(&items, &ctx, &scenario_params()).unwrap().breakdown;

    assert_eq!(b.isolated_fee, dec!(8));
    assert_eq!(b.urgent_fee, dec!(4));
    assert_eq!(b.weather_fee, dec!(3));
    assert_eq!(b.delivery_fee_without_profit, dec!(20.50));
    assert_eq!(b.profit_share, dec!(0));
    assert_eq!(b.rider_payable_fee, dec!(20.50));
    assert_eq!(b.customer_delivery_fee, dec!(3));
    assert_eq!(b.customer_urgent_fee, dec!(2));
    assert_eq!(customer_total(&b), dec!(35));
}

// ========================================================================
// Boundaries
// ========================================================================

#[test]
fn empty_cart_fails() {
    let err = calculate(&[], &retail(), &scenario_params()).unwrap_err();
    assert_eq!(err, FeeError::EmptyCart);
}

#[test]
fn goods_equal_to_threshold_ships_free() {
    let items = [item(1, dec!(10), dec!(0), dec!(50), 2)];
    let b = calculate(&items, &retail(), &scenario_params()).unwrap().breakdown;
    assert_eq!(b.goods_amount, dec!(100));
    assert!(b.is_free_shipping);
    assert_eq!(b.customer_delivery_fee, dec!(0));
}

#[test]
fn profit_equal_to_threshold_earns_no_share() {
    // goods 20, cost 2.5, rider 7.5 (5 + 5 * 0.5) => profit exactly 10
    let items = [item(1, dec!(0.5), dec!(0), dec!(4), 5)];
    let b = calculate(&items, &retail(), &scenario_params()).unwrap().breakdown;
    assert_eq!(b.delivery_fee_without_profit, dec!(7.50));
    assert_eq!(b.goods_amount - b.goods_cost - b.delivery_fee_without_profit, dec!(10));
    assert_eq!(b.profit_share, dec!(0));
}

#[test]
fn profit_share_is_capped() {
    let items = [item(1, dec!(10), dec!(0), dec!(500), 1)];
    let b = calculate(&items, &retail(), &scenario_params()).unwrap().breakdown;
    assert_eq!(b.profit_share, dec!(5));
    assert_eq!(b.rider_payable_fee, b.delivery_fee_without_profit + b.profit_share);
}

#[test]
fn online_payment_rejects_zero_cost() {
    let items = [item(7, dec!(0), dec!(0), dec!(9), 1)];
    let ctx = FeeContext {
        payment_method: PaymentMethod::Online,
        ..Default::default()
    };
    let err = calculate(&items, &ctx, &scenario_params()).unwrap_err();
    assert_eq!(err, FeeError::UnpricedSku { product_id: 7 });
    // cash on delivery tolerates it
    assert!(calculate(&items, &retail(), &scenario_params()).is_ok());
}

#[test]
fn zero_quantity_is_invalid() {
    let items = [item(3, dec!(1), dec!(0), dec!(2), 0)];
    let err = calculate(&items, &retail(), &scenario_params()).unwrap_err();
    assert!(matches!(err, FeeError::InvalidItem { product_id: 3, .. }));
}

#[test]
fn price_falls_back_retail_then_cost() {
    let it = item(1, dec!(3), dec!(0), dec!(0), 1);
    assert_eq!(it.unit_price(UserType::Wholesale), dec!(3));
    let it = item(1, dec!(3), dec!(0), dec!(5), 1);
    assert_eq!(it.unit_price(UserType::Wholesale), dec!(5));
    let it = item(1, dec!(3), dec!(4), dec!(5), 1);
    assert_eq!(it.unit_price(UserType::Retail), dec!(5));
    assert_eq!(it.unit_price(UserType::Wholesale), dec!(4));
    let it = item(1, dec!(-1), dec!(0), dec!(0), 1);
    assert_eq!(it.unit_price(UserType::Retail), dec!(0));
}

#[test]
fn item_fee_tiers() {
    let p = scenario_params();
    assert_eq!(item_fee(dec!(0), &p), dec!(0));
    assert_eq!(item_fee(dec!(3), &p), dec!(1.5));
    assert_eq!(item_fee(dec!(5), &p), dec!(2.5));
    assert_eq!(item_fee(dec!(8), &p), dec!(3.4));
    assert_eq!(item_fee(dec!(10), &p), dec!(4.0));
    // beyond the high threshold nothing more is added
    assert_eq!(item_fee(dec!(15), &p), dec!(4.0));
}

#[test]
fn max_count_caps_billable_items() {
    let mut p = scenario_params();
    p.item_max_count = dec!(4);
    let items = [item(1, dec!(1), dec!(0), dec!(2), 9)];
    let b = calculate(&items, &retail(), &p).unwrap().breakdown;
    assert_eq!(b.item_fee, dec!(2.00));
}

#[test]
fn delivery_weight_rounds_up() {
    let mut heavy = item(1, dec!(1), dec!(0), dec!(2), 3);
    heavy.delivery_weight = dec!(1.5);
    // ceil(4.5) = 5 units
    let b = calculate(&[heavy], &retail(), &scenario_params()).unwrap().breakdown;
    assert_eq!(b.item_fee, dec!(2.50));
}

// ========================================================================
// Exclusions
// ========================================================================

fn excluded(mut it: FeeItem, scope: ExclusionScope, min: Option<i32>) -> FeeItem {
    it.exclusion = Some(ExclusionRule {
        scope,
        min_quantity_for_free: min,
    });
    it
}

#[test]
fn excluded_items_do_not_count_toward_item_fee() {
    let items = [
        item(1, dec!(1), dec!(0), dec!(2), 2),
        excluded(item(2, dec!(1), dec!(0), dec!(2), 6), ExclusionScope::Product(2), None),
    ];
    let b = calculate(&items, &retail(), &scenario_params()).unwrap().breakdown;
    assert_eq!(b.item_fee, dec!(1.00));
    assert!(!b.is_free_shipping);
}

#[test]
fn all_excluded_and_satisfied_ships_free() {
    let items = [excluded(
        item(2, dec!(1), dec!(0), dec!(2), 6),
        ExclusionScope::Product(2),
        Some(5),
    )];
    let quote = calculate(&items, &retail(), &scenario_params()).unwrap();
    assert!(quote.breakdown.is_free_shipping);
    assert_eq!(quote.breakdown.customer_delivery_fee, dec!(0));
    assert!(quote.blockers.is_empty());
}

#[test]
fn category_rule_counts_whole_category() {
    let mut a = item(1, dec!(1), dec!(0), dec!(2), 2);
    a.category_ids = vec![30, 3];
    let mut b = item(2, dec!(1), dec!(0), dec!(2), 2);
    b.category_ids = vec![31, 3];
    let items = [
        excluded(a.clone(), ExclusionScope::Category(3), Some(4)),
        excluded(b.clone(), ExclusionScope::Category(3), Some(4)),
    ];
    let quote = calculate(&items, &retail(), &scenario_params()).unwrap();
    assert!(quote.breakdown.is_free_shipping);

    let items = [
        excluded(a, ExclusionScope::Category(3), Some(5)),
        excluded(b, ExclusionScope::Category(3), Some(5)),
    ];
    let quote = calculate(&items, &retail(), &scenario_params()).unwrap();
    assert!(!quote.breakdown.is_free_shipping);
    assert_eq!(
        quote.blockers,
        vec![FreeShippingBlocker {
            scope: ExclusionScope::Category(3),
            current_quantity: 4,
            required_quantity: Some(5),
        }]
    );
}

#[test]
fn blockers_serialize_flat() {
    let blocker = FreeShippingBlocker {
        scope: ExclusionScope::Product(9),
        current_quantity: 1,
        required_quantity: None,
    };
    let json = serde_json::to_value(&blocker).unwrap();
    assert_eq!(json["item_type"], "product");
    assert_eq!(json["target_id"], 9);
}

// ========================================================================
// Laws
// ========================================================================

#[test]
fn breakdown_identities_hold() {
    let items = [
        item(1, dec!(3.33), dec!(0), dec!(9.99), 7),
        item(2, dec!(1.11), dec!(0), dec!(4.44), 5),
    ];
    let ctx = FeeContext {
        is_urgent: true,
        weather: WeatherTag::Snow,
        ..Default::default()
    };
    let b = calculate(&items, &ctx, &scenario_params()).unwrap().breakdown;
    assert_eq!(
        b.delivery_fee_without_profit,
        b.base_fee + b.isolated_fee + b.item_fee + b.urgent_fee + b.weather_fee
    );
    assert_eq!(b.rider_payable_fee, b.delivery_fee_without_profit + b.profit_share);
    assert!(b.profit_share <= dec!(5));
    assert_eq!(b.total_platform_cost, b.rider_payable_fee);
}

#[test]
fn stored_breakdown_matches_recomputation() {
    let items = [
        item(1, dec!(3.00), dec!(0), dec!(5.00), 2),
        item(2, dec!(2.00), dec!(0), dec!(4.00), 3),
    ];
    let params = scenario_params();
    let stored = serde_json::to_string(
        &calculate(&items, &retail(), &params).unwrap().breakdown,
    )
    .unwrap();
    let reread: shared::models::FeeBreakdown = serde_json::from_str(&stored).unwrap();
    let recomputed = calculate(&items, &retail(), &params).unwrap().breakdown;
    assert_eq!(reread.normalized(), recomputed.normalized());
}
