//! Cart Data

use rust_decimal::Decimal;

use crate::domain::{
    carts::records::CartItemUuid,
    catalog::records::{ProductUuid, VariantUuid},
};

/// New Cart Item Data
///
/// Adding a product/variant already in the cart increments that line's
/// quantity instead, and `uuid` is ignored.
#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub product_variant_uuid: Option<VariantUuid>,
    pub quantity: u32,
}

/// Cart Settings
#[derive(Debug, Clone, Copy)]
pub struct CartSettings {
    /// Tax percentage applied to the cart subtotal.
    pub tax_rate: Decimal,

    /// Read-modify-write attempts per re-price before giving up. Minimum 1.
    pub reprice_attempts: u32,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::ZERO,
            reprice_attempts: 2,
        }
    }
}
