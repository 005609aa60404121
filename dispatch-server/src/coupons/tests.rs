use super::*;
use chrono::{Duration, TimeZone};
use rust_decimal_macros::dec;
use shared::models::Coupon;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn coupon(id: i64, kind: CouponKind, value: Decimal, expires_in_days: i64) -> UserCoupon {
    UserCoupon {
        id,
        user_id: 1,
        coupon: Coupon {
            id: 100 + id,
            name: format!("c{id}"),
            kind,
            discount_value: value,
            min_amount: dec!(0),
            category_ids: vec![],
            total_count: 0,
            used_count: 0,
            valid_from: now() - Duration::days(30),
            valid_to: now() + Duration::days(365),
            is_active: true,
        },
        status: UserCouponStatus::Issued,
        expires_at: now() + Duration::days(expires_in_days),
        order_id: None,
    }
}

fn order(goods: Decimal, fee: Decimal) -> CouponOrderView {
    CouponOrderView {
        goods_amount: goods,
        customer_delivery_fee: fee,
        category_ids: HashSet::from([3, 30]),
    }
}

#[test]
fn auto_selects_best_of_each_kind() {
    let wallet = vec![
        coupon(1, CouponKind::Amount, dec!(5), 10),
        coupon(2, CouponKind::Amount, dec!(8), 10),
        coupon(3, CouponKind::DeliveryFee, dec!(0), 10),
    ];
    let applied = select(&wallet, None, &order(dec!(50), dec!(3)), now()).unwrap();
    assert_eq!(applied.amount_coupon_id(), Some(2));
    assert_eq!(applied.delivery_coupon_id(), Some(3));
    assert_eq!(applied.delivery_waiver(), dec!(3));
    assert_eq!(applied.amount_discount(), dec!(8));
    assert_eq!(applied.coupon_discount(), dec!(11));
}

#[test]
fn amount_discount_never_exceeds_goods() {
    let wallet = vec![
        coupon(1, CouponKind::Amount, dec!(30), 10),
        coupon(2, CouponKind::Amount, dec!(20), 10),
    ];
    // both cap at 12; tie broken by expiry then id
    let applied = select(&wallet, None, &order(dec!(12), dec!(3)), now()).unwrap();
    assert_eq!(applied.amount_discount(), dec!(12));
    assert_eq!(applied.amount_coupon_id(), Some(1));
}

#[test]
fn tie_breaks_by_later_expiry_then_lower_id() {
    let wallet = vec![
        coupon(5, CouponKind::Amount, dec!(5), 10),
        coupon(4, CouponKind::Amount, dec!(5), 20),
        coupon(3, CouponKind::Amount, dec!(5), 20),
    ];
    let applied = select(&wallet, None, &order(dec!(50), dec!(3)), now()).unwrap();
    assert_eq!(applied.amount_coupon_id(), Some(3));
}

#[test]
fn free_shipping_order_gets_no_delivery_coupon() {
    let wallet = vec![coupon(3, CouponKind::DeliveryFee, dec!(0), 10)];
    let applied = select(&wallet, None, &order(dec!(150), dec!(0)), now()).unwrap();
    assert_eq!(applied.delivery, None);
}

#[test]
fn ineligible_coupons_are_skipped_automatically() {
    let mut min = coupon(1, CouponKind::Amount, dec!(9), 10);
    min.coupon.min_amount = dec!(100);
    let mut cat = coupon(2, CouponKind::Amount, dec!(9), 10);
    cat.coupon.category_ids = vec![77];
    let expired = coupon(3, CouponKind::Amount, dec!(9), -1);
    let ok = coupon(4, CouponKind::Amount, dec!(1), 10);
    let wallet = vec![min, cat, expired, ok];
    let applied = select(&wallet, None, &order(dec!(50), dec!(3)), now()).unwrap();
    assert_eq!(applied.amount_coupon_id(), Some(4));
}

#[test]
fn explicit_choice_reports_errors() {
    let mut min = coupon(1, CouponKind::Amount, dec!(9), 10);
    min.coupon.min_amount = dec!(100);
    let expired = coupon(2, CouponKind::Amount, dec!(9), -1);
    let mut full = coupon(3, CouponKind::Amount, dec!(9), 10);
    full.coupon.total_count = 10;
    full.coupon.used_count = 10;
    let delivery = coupon(4, CouponKind::DeliveryFee, dec!(0), 10);
    let wallet = vec![min, expired, full, delivery];
    let o = order(dec!(50), dec!(3));

    let pick = |amount| CouponChoice {
        delivery_coupon_id: None,
        amount_coupon_id: Some(amount),
    };
    assert!(matches!(
        select(&wallet, Some(pick(1)), &o, now()),
        Err(CouponError::NotEligible { id: 1, .. })
    ));
    assert_eq!(
        select(&wallet, Some(pick(2)), &o, now()),
        Err(CouponError::Expired(2))
    );
    assert_eq!(
        select(&wallet, Some(pick(3)), &o, now()),
        Err(CouponError::Exhausted(3))
    );
    // wrong kind
    assert!(matches!(
        select(&wallet, Some(pick(4)), &o, now()),
        Err(CouponError::NotEligible { id: 4, .. })
    ));
    assert_eq!(
        select(&wallet, Some(pick(99)), &o, now()),
        Err(CouponError::NotFound(99))
    );
}

#[test]
fn explicit_choice_without_coupons_applies_nothing() {
    let wallet = vec![coupon(1, CouponKind::Amount, dec!(5), 10)];
    let applied = select(
        &wallet,
        Some(CouponChoice::default()),
        &order(dec!(50), dec!(3)),
        now(),
    )
    .unwrap();
    assert_eq!(applied, AppliedCoupons::default());
}

#[test]
fn reserved_kind_blocks_another_reservation() {
    let mut held = coupon(1, CouponKind::DeliveryFee, dec!(0), 10);
    held.status = UserCouponStatus::Reserved;
    held.order_id = Some(9);
    let wallet = vec![
        held,
        coupon(2, CouponKind::DeliveryFee, dec!(0), 10),
        coupon(3, CouponKind::Amount, dec!(2), 10),
    ];
    let o = order(dec!(50), dec!(3));

    let applied = select(&wallet, None, &o, now()).unwrap();
    assert_eq!(applied.delivery, None);
    assert_eq!(applied.amount_coupon_id(), Some(3));

    let choice = CouponChoice {
        delivery_coupon_id: Some(2),
        amount_coupon_id: None,
    };
    assert_eq!(
        select(&wallet, Some(choice), &o, now()),
        Err(CouponError::AlreadyReserved(CouponKind::DeliveryFee))
    );
}

#[test]
fn delivery_coupon_waives_the_whole_fee() {
    // the face value of a delivery coupon does not cap the waiver
    let wallet = vec![coupon(1, CouponKind::DeliveryFee, dec!(2), 10)];
    let applied = select(&wallet, None, &order(dec!(50), dec!(3)), now()).unwrap();
    assert_eq!(applied.delivery_waiver(), dec!(3));

    let choice = CouponChoice {
        delivery_coupon_id: Some(1),
        amount_coupon_id: None,
    };
    let applied = select(&wallet, Some(choice), &order(dec!(50), dec!(7.5)), now()).unwrap();
    assert_eq!(
        applied.delivery,
        Some(CouponApplication::DeliveryWaiver {
            user_coupon_id: 1,
            waived: dec!(7.5),
        })
    );
}

#[test]
fn chosen_delivery_coupon_is_rejected_on_free_shipping() {
    let wallet = vec![coupon(1, CouponKind::DeliveryFee, dec!(0), 10)];
    let choice = CouponChoice {
        delivery_coupon_id: Some(1),
        amount_coupon_id: None,
    };
    assert!(matches!(
        select(&wallet, Some(choice), &order(dec!(150), dec!(0)), now()),
        Err(CouponError::NotEligible { id: 1, .. })
    ));
}

#[test]
fn only_the_holding_order_may_move_a_coupon() {
    let mut reserved = coupon(1, CouponKind::DeliveryFee, dec!(0), 10);
    reserved.status = UserCouponStatus::Reserved;
    reserved.order_id = Some(7);
    assert!(held_by(&reserved, 7));
    // reserved by another order
    assert!(!held_by(&reserved, 8));

    let mut used = reserved.clone();
    used.status = UserCouponStatus::Used;
    assert!(held_by(&used, 7));
    assert!(!held_by(&used, 8));

    // back in the wallet after the holder was cancelled
    let mut released = reserved.clone();
    released.status = UserCouponStatus::Issued;
    released.order_id = None;
    assert!(!held_by(&released, 7));
}

#[test]
fn state_machine() {
    use CouponEvent as E;
    use UserCouponStatus as S;
    assert_eq!(next_status(1, S::Issued, E::Reserve), Ok(S::Reserved));
    assert_eq!(next_status(1, S::Reserved, E::Consume), Ok(S::Used));
    assert_eq!(next_status(1, S::Used, E::Consume), Ok(S::Used));
    assert_eq!(next_status(1, S::Reserved, E::Release), Ok(S::Issued));
    assert_eq!(next_status(1, S::Used, E::Restore), Ok(S::Issued));
    assert_eq!(next_status(1, S::Reserved, E::Expire), Ok(S::Expired));
    assert!(next_status(1, S::Reserved, E::Reserve).is_err());
    assert!(next_status(1, S::Used, E::Release).is_err());
    assert!(next_status(1, S::Expired, E::Reserve).is_err());
}

#[test]
fn error_codes() {
    let e: AppError = CouponError::AlreadyReserved(CouponKind::Amount).into();
    assert_eq!(e.code, ErrorCode::CouponAlreadyReserved);
    assert_eq!(e.http_status(), http::StatusCode::BAD_REQUEST);
    let e: AppError = CouponError::Exhausted(4).into();
    assert_eq!(e.code, ErrorCode::CouponExhausted);
}

#[test]
fn unreservable_coupons_are_dropped_from_a_paid_draft() {
    let mut taken = coupon(1, CouponKind::DeliveryFee, dec!(0), 10);
    taken.status = UserCouponStatus::Reserved;
    taken.order_id = Some(8);
    let free = coupon(2, CouponKind::Amount, dec!(5), 10);
    let mut applied = AppliedCoupons {
        delivery: Some(CouponApplication::DeliveryWaiver {
            user_coupon_id: 1,
            waived: dec!(3),
        }),
        amount: Some(CouponApplication::AmountOff {
            user_coupon_id: 2,
            discount: dec!(5),
        }),
    };

    let dropped = retain_reservable(&mut applied, &[taken, free]);
    assert_eq!(dropped, vec![1]);
    assert_eq!(applied.delivery_coupon_id(), None);
    assert_eq!(applied.amount_coupon_id(), Some(2));
    assert_eq!(applied.user_coupon_ids(), vec![2]);

    // a coupon missing from the wallet cannot be reserved either
    let dropped = retain_reservable(&mut applied, &[]);
    assert_eq!(dropped, vec![2]);
    assert_eq!(applied, AppliedCoupons::default());
}
