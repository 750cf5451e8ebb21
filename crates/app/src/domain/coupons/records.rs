//! Coupon Records

use cartwright::coupons::CouponPolicy;
use jiff::Timestamp;

use crate::{domain::users::records::UserUuid, uuids::TypedUuid};

/// Coupon UUID
pub type CouponUuid = TypedUuid<CouponRecord>;

/// Coupon Claim UUID
pub type CouponClaimUuid = TypedUuid<CouponClaimRecord>;

/// Coupon Record
#[derive(Debug, Clone)]
pub struct CouponRecord {
    pub uuid: CouponUuid,
    pub code: String,
    pub policy: CouponPolicy,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Coupon Claim Record
///
/// One row per successful claim. Rows are never removed.
#[derive(Debug, Clone)]
pub struct CouponClaimRecord {
    pub uuid: CouponClaimUuid,
    pub coupon_uuid: CouponUuid,
    pub user_uuid: UserUuid,
    pub created_at: Timestamp,
}
