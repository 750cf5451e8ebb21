//! Cart Records

use cartwright::coupons::DiscountKind;
use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{
        catalog::records::{ProductUuid, VariantUuid},
        coupons::records::CouponUuid,
        users::records::UserUuid,
    },
    uuids::TypedUuid,
};

/// Cart UUID
pub type CartUuid = TypedUuid<CartRecord>;

/// Cart Record
///
/// One cart per user.
#[derive(Debug, Clone)]
pub struct CartRecord {
    pub uuid: CartUuid,
    pub user_uuid: UserUuid,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Cart Item UUID
pub type CartItemUuid = TypedUuid<CartItemRecord>;

/// Cart Item Record
///
/// The economics columns are only ever written together, by the line pricer,
/// and every write bumps `version`.
#[derive(Debug, Clone)]
pub struct CartItemRecord {
    pub uuid: CartItemUuid,
    pub cart_uuid: CartUuid,
    pub product_uuid: ProductUuid,
    pub product_variant_uuid: Option<VariantUuid>,
    pub total_quantity: u32,
    pub price_at_time: Decimal,
    pub discount_quantity: Option<u32>,
    pub discount_applied: Decimal,
    pub discount_type: Option<DiscountKind>,
    pub final_price: Decimal,
    pub coupon_uuid: Option<CouponUuid>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
