//! Claim rule ordering and limits.

use jiff::{Timestamp, ToSpan};
use rust_decimal_macros::dec;
use testresult::TestResult;
use uuid::Uuid;

use cartwright::{
    coupons::{CouponPolicy, CouponTarget, DiscountKind, TargetContext, TargetRole},
    eligibility::{ClaimUsage, DenyReason, can_claim},
};

fn new_user_coupon(now: Timestamp) -> TestResult<CouponPolicy> {
    Ok(CouponPolicy {
        kind: DiscountKind::Percentage,
        value: dec!(10),
        target: CouponTarget::Cart,
        target_role: TargetRole::Both,
        min_cart_value: None,
        max_discount_value: None,
        usage_limit: Some(100),
        usage_per_user: Some(1),
        valid_from: now.checked_sub(24.hours())?,
        valid_to: now.checked_add(24.hours())?,
        is_active: true,
        is_user_new: true,
    })
}

/// A user who claimed some other coupon is no longer "new" for this one.
#[test]
fn new_user_rule_is_global_across_coupons() -> TestResult {
    let now = Timestamp::now();
    let coupon = new_user_coupon(now)?;

    let claimed_another_coupon = ClaimUsage {
        user_claims_total: 1,
        user_claims_of_coupon: 0,
        coupon_claims_total: 0,
    };

    let result = can_claim(&coupon, &TargetContext::default(), now, &claimed_another_coupon);

    assert_eq!(result, Err(DenyReason::NotNewUser));

    let never_claimed = ClaimUsage::default();

    assert_eq!(
        can_claim(&coupon, &TargetContext::default(), now, &never_claimed),
        Ok(())
    );

    Ok(())
}

#[test]
fn offer_rules_are_checked_before_usage_rules() -> TestResult {
    let now = Timestamp::now();
    let mut coupon = new_user_coupon(now)?;
    coupon.target = CouponTarget::Product(Uuid::now_v7());

    let exhausted = ClaimUsage {
        user_claims_total: 5,
        user_claims_of_coupon: 5,
        coupon_claims_total: 100,
    };

    let result = can_claim(&coupon, &TargetContext::default(), now, &exhausted);

    assert!(
        matches!(result, Err(DenyReason::ScopeMismatch { .. })),
        "expected ScopeMismatch, got {result:?}"
    );

    Ok(())
}

#[test]
fn last_claim_under_the_limit_is_allowed() -> TestResult {
    let now = Timestamp::now();
    let mut coupon = new_user_coupon(now)?;
    coupon.is_user_new = false;
    coupon.usage_per_user = None;
    coupon.usage_limit = Some(1);

    assert_eq!(
        can_claim(&coupon, &TargetContext::default(), now, &ClaimUsage::default()),
        Ok(())
    );

    let one_claim = ClaimUsage {
        coupon_claims_total: 1,
        ..ClaimUsage::default()
    };

    assert_eq!(
        can_claim(&coupon, &TargetContext::default(), now, &one_claim),
        Err(DenyReason::UsageLimitReached { used: 1, limit: 1 })
    );

    Ok(())
}
