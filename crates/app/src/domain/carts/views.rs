//! Cart Views
//!
//! Read-only projections of a user's cart. Line amounts are the persisted
//! ones; only the order-level totals are summed here.

use cartwright::totals::{CartTotals, TotalsLine};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{
    carts::records::{CartItemRecord, CartItemUuid, CartUuid},
    catalog::records::{BrandUuid, CategoryUuid, LineCatalog, ProductUuid, VariantUuid},
    coupons::records::{CouponRecord, CouponUuid},
    users::records::UserUuid,
};

/// One cart line as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub item_uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub product_name: Option<String>,
    pub variant_uuid: Option<VariantUuid>,
    pub variant_name: Option<String>,
    pub brand_uuid: Option<BrandUuid>,
    pub category_uuid: Option<CategoryUuid>,
    pub quantity: u32,
    pub price_at_time: Decimal,
    pub discount_quantity: Option<u32>,
    pub discount_applied: Decimal,
    pub discount_type: Option<&'static str>,
    pub final_price: Decimal,
    pub coupon_uuid: Option<CouponUuid>,
    pub coupon_code: Option<String>,

    /// Inactive, out-of-stock or deleted products are shown but not charged.
    pub is_purchasable: bool,

    /// The persisted price no longer matches a fresh derivation.
    pub is_stale: bool,
}

impl CartLineView {
    /// Project a stored line. `catalog` is `None` once the product or variant
    /// has been deleted.
    pub(crate) fn new(
        item: &CartItemRecord,
        catalog: Option<&LineCatalog>,
        coupon: Option<&CouponRecord>,
        is_stale: bool,
    ) -> Self {
        Self {
            item_uuid: item.uuid,
            product_uuid: item.product_uuid,
            product_name: catalog.map(|line| line.product.name.clone()),
            variant_uuid: item.product_variant_uuid,
            variant_name: catalog
                .and_then(|line| line.variant.as_ref())
                .map(|variant| variant.name.clone()),
            brand_uuid: catalog.and_then(|line| line.product.brand_uuid),
            category_uuid: catalog.and_then(|line| line.product.category_uuid),
            quantity: item.total_quantity,
            price_at_time: item.price_at_time,
            discount_quantity: item.discount_quantity,
            discount_applied: item.discount_applied,
            discount_type: item.discount_type.map(|kind| kind.as_str()),
            final_price: item.final_price,
            coupon_uuid: item.coupon_uuid,
            coupon_code: coupon.map(|coupon| coupon.code.clone()),
            is_purchasable: catalog.is_some_and(LineCatalog::is_purchasable),
            is_stale,
        }
    }

    fn totals_line(&self) -> TotalsLine {
        TotalsLine {
            final_price: self.final_price,
            discount_applied: self.discount_applied,
            is_purchasable: self.is_purchasable,
        }
    }
}

/// A coupon the user could apply.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableCouponView {
    pub coupon_uuid: CouponUuid,
    pub code: String,
    pub discount_type: &'static str,
    pub discount_value: Decimal,
    pub max_discount_value: Option<Decimal>,
    pub min_cart_value: Option<Decimal>,
    pub target_type: &'static str,
}

impl From<&CouponRecord> for AvailableCouponView {
    fn from(coupon: &CouponRecord) -> Self {
        let policy = &coupon.policy;

        Self {
            coupon_uuid: coupon.uuid,
            code: coupon.code.clone(),
            discount_type: policy.kind.as_str(),
            discount_value: policy.value,
            max_discount_value: policy.max_discount_value,
            min_cart_value: policy.min_cart_value,
            target_type: policy.target.type_as_str(),
        }
    }
}

/// A user's cart with order-level totals and the coupons on offer.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    /// `None` until the user first adds something.
    pub cart_uuid: Option<CartUuid>,
    pub user_uuid: UserUuid,
    pub items: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub available_coupons: Vec<AvailableCouponView>,
}

impl CartView {
    pub(crate) fn new(
        cart_uuid: Option<CartUuid>,
        user_uuid: UserUuid,
        items: Vec<CartLineView>,
        available_coupons: Vec<AvailableCouponView>,
        tax_rate: Decimal,
    ) -> Self {
        let lines: Vec<TotalsLine> = items.iter().map(CartLineView::totals_line).collect();
        let totals = CartTotals::from_lines(&lines, tax_rate);

        Self {
            cart_uuid,
            user_uuid,
            items,
            subtotal: totals.subtotal,
            discount_total: totals.discount_total,
            tax: totals.tax,
            total: totals.total,
            available_coupons,
        }
    }
}
