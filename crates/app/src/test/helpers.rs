//! Test Helpers

use cartwright::coupons::{CouponPolicy, CouponTarget, DiscountKind, TargetRole};
use jiff::{Timestamp, ToSpan};
use rust_decimal::Decimal;
use testresult::TestResult;

/// An active, cart-wide coupon for every role, valid for a day either side of
/// now, with no limits.
pub(crate) fn coupon_policy(kind: DiscountKind, value: Decimal) -> TestResult<CouponPolicy> {
    let now = Timestamp::now();

    Ok(CouponPolicy {
        kind,
        value,
        target: CouponTarget::Cart,
        target_role: TargetRole::Both,
        min_cart_value: None,
        max_discount_value: None,
        usage_limit: None,
        usage_per_user: None,
        valid_from: now.checked_sub(24.hours())?,
        valid_to: now.checked_add(24.hours())?,
        is_active: true,
        is_user_new: false,
    })
}
