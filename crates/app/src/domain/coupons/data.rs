//! Coupon Data

use cartwright::coupons::CouponPolicy;

use crate::domain::coupons::records::CouponUuid;

/// New Coupon
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub uuid: CouponUuid,
    pub code: String,
    pub policy: CouponPolicy,
}
