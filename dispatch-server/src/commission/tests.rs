use super::*;
use chrono::TimeZone;
use rust_decimal_macros::dec;
use shared::models::CommissionTier;

fn scenario_config() -> CommissionConfig {
    CommissionConfig {
        employee_code: "S001".into(),
        base_rate: dec!(0.05),
        new_customer_bonus_rate: dec!(0.02),
        tiers: [
            CommissionTier {
                threshold: dec!(5000),
                rate: dec!(0.02),
            },
            CommissionTier {
                threshold: dec!(10000),
                rate: dec!(0.03),
            },
            CommissionTier {
                threshold: dec!(20000),
                rate: dec!(0.04),
            },
        ],
        min_profit_threshold: dec!(10),
    }
}

fn row(id: i64, amount: Decimal, profit: Decimal) -> SalesCommission {
    SalesCommission {
        id,
        order_id: id,
        order_number: format!("P{id}"),
        employee_code: "S001".into(),
        user_id: 7,
        order_amount: amount,
        goods_cost: dec!(0),
        delivery_cost: dec!(0),
        profit,
        base_commission: round_money(profit * dec!(0.05)),
        new_customer_bonus: dec!(0),
        tier_commission: dec!(0),
        total_commission: round_money(profit * dec!(0.05)),
        tier_level: 0,
        is_valid_order: true,
        is_new_customer_order: false,
        calculation_month: "2025-06".into(),
        settlement_date: Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap(),
        is_accounted: true,
        is_settled: false,
        is_accounted_cancelled: false,
        created_at: Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap(),
    }
}

#[test]
fn tier_boundary_includes_current_order() {
    // 9,500 + 600 = 10,100 >= 10,000 => tier 2 at 0.03
    let input = CommissionInput {
        order_amount: dec!(600),
        goods_cost: dec!(300),
        delivery_cost: dec!(100),
        is_new_customer_order: true,
        month_to_date_sales: dec!(9500),
    };
    let c = calculate(&input, &scenario_config());
    assert_eq!(c.profit, dec!(200));
    assert_eq!(c.base_commission, dec!(10));
    assert_eq!(c.new_customer_bonus, dec!(4));
    assert_eq!(c.tier_commission, dec!(6));
    assert_eq!(c.total_commission, dec!(20));
    assert_eq!(c.applied_tier, 2);
    assert!(c.is_valid_order);
}

#[test]
fn below_min_profit_pays_nothing() {
    let input = CommissionInput {
        order_amount: dec!(100),
        goods_cost: dec!(85),
        delivery_cost: dec!(6),
        is_new_customer_order: true,
        month_to_date_sales: dec!(50000),
    };
    let c = calculate(&input, &scenario_config());
    assert_eq!(c.profit, dec!(9));
    assert_eq!(c.total_commission, dec!(0));
    assert_eq!(c.applied_tier, 0);
    assert!(!c.is_valid_order);
}

#[test]
fn profit_at_min_threshold_is_valid() {
    let input = CommissionInput {
        order_amount: dec!(110),
        goods_cost: dec!(100),
        delivery_cost: dec!(0),
        is_new_customer_order: false,
        month_to_date_sales: dec!(0),
    };
    let c = calculate(&input, &scenario_config());
    assert!(c.is_valid_order);
    assert_eq!(c.base_commission, dec!(0.50));
    assert_eq!(c.new_customer_bonus, dec!(0));
    assert_eq!(c.applied_tier, 0);
}

#[test]
fn tier_selection() {
    let cfg = scenario_config();
    assert_eq!(tier_for(dec!(4999.99), &cfg), (0, dec!(0)));
    assert_eq!(tier_for(dec!(5000), &cfg), (1, dec!(0.02)));
    assert_eq!(tier_for(dec!(19999), &cfg), (2, dec!(0.03)));
    assert_eq!(tier_for(dec!(250000), &cfg), (3, dec!(0.04)));
}

#[test]
fn default_config_is_valid() {
    let cfg = CommissionConfig::default_for("S9");
    assert_eq!(validate_config(&cfg), Ok(()));
    assert_eq!(cfg.base_rate, dec!(0.45));
    assert_eq!(cfg.tiers[2].threshold, dec!(200000));
}

#[test]
fn invalid_configs_are_rejected() {
    let mut cfg = scenario_config();
    cfg.base_rate = dec!(1.5);
    assert!(validate_config(&cfg).is_err());

    let mut cfg = scenario_config();
    cfg.tiers[0].threshold = dec!(30000);
    assert!(validate_config(&cfg).is_err());

    let mut cfg = scenario_config();
    cfg.employee_code = " ".into();
    assert!(validate_config(&cfg).is_err());
}

#[test]
fn month_in_regional_zone() {
    let zone = FixedOffset::east_opt(8 * 3600).unwrap();
    // 2025-06-30 17:00 UTC is already July in UTC+8
    let at = Utc.with_ymd_and_hms(2025, 6, 30, 17, 0, 0).unwrap();
    assert_eq!(calculation_month(at, zone), "2025-07");
    assert_eq!(parse_month("2025-07").unwrap(), "2025-07");
    assert!(parse_month("2025-13").is_err());
    assert!(parse_month("2025-7").is_err());
}

#[test]
fn recalculation_uses_final_month_volume() {
    let mut cancelled = row(3, dec!(9000), dec!(100));
    cancelled.is_accounted_cancelled = true;
    let rows = vec![row(1, dec!(3000), dec!(100)), row(2, dec!(2500), dec!(50)), cancelled];
    assert_eq!(month_volume(&rows), dec!(5500));

    let adj = recalculate_month(&rows, &scenario_config());
    assert_eq!(adj.len(), 2);
    assert_eq!(adj[0].id, 1);
    assert_eq!(adj[0].tier_level, 1);
    assert_eq!(adj[0].tier_commission, dec!(2));
    assert_eq!(adj[0].total_commission, dec!(7));
    assert_eq!(adj[1].tier_commission, dec!(1));

    // applying the adjustments makes the next run a no-op
    let settled: Vec<_> = rows
        .iter()
        .cloned()
        .map(|mut r| {
            if let Some(a) = adj.iter().find(|a| a.id == r.id) {
                r.tier_level = i32::from(a.tier_level);
                r.tier_commission = a.tier_commission;
                r.total_commission = a.total_commission;
            }
            r
        })
        .collect();
    assert!(recalculate_month(&settled, &scenario_config()).is_empty());
}

#[test]
fn stats_skip_cancelled_rows() {
    let mut r2 = row(2, dec!(200), dec!(40));
    r2.is_settled = true;
    r2.is_new_customer_order = true;
    let mut r3 = row(3, dec!(999), dec!(99));
    r3.is_accounted_cancelled = true;
    let stats = monthly_stats("S001", "2025-06", &[row(1, dec!(100), dec!(20)), r2, r3]);
    assert_eq!(stats.order_count, 2);
    assert_eq!(stats.new_customer_count, 1);
    assert_eq!(stats.total_sales, dec!(300));
    assert_eq!(stats.total_profit, dec!(60));
    assert_eq!(stats.total_commission, dec!(3));
    assert_eq!(stats.settled_commission, dec!(2));
}

#[test]
fn reversal_rules() {
    let mut r = row(1, dec!(100), dec!(20));
    r.is_accounted = false;
    assert_eq!(reversal_for(&r), Reversal::Delete);
    r.is_accounted = true;
    assert_eq!(reversal_for(&r), Reversal::MarkCancelled);
    r.is_accounted_cancelled = true;
    assert_eq!(reversal_for(&r), Reversal::Keep);
}
