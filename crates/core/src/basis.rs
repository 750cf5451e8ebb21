//! Price Basis
//!
//! The unit price and quantity tiers a cart line is priced against. Products
//! and variants both carry pricing fields; [`resolve_price_basis`] decides which
//! of the two a line uses.

use rust_decimal::Decimal;

/// A "buy at least N, get X% off each unit" tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityTier {
    threshold: u32,
    percentage: Decimal,
}

impl QuantityTier {
    /// Create a tier. Returns `None` for a zero threshold or a percentage
    /// outside `0..=100`, which are treated as "not configured".
    pub fn new(threshold: u32, percentage: Decimal) -> Option<Self> {
        if threshold == 0 || percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return None;
        }

        Some(Self {
            threshold,
            percentage,
        })
    }

    /// Minimum quantity at which the tier fires.
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Percentage off each unit, `0..=100`.
    pub const fn percentage(&self) -> Decimal {
        self.percentage
    }

    /// Whether the tier fires for `quantity`.
    pub const fn is_met_by(&self, quantity: u32) -> bool {
        quantity >= self.threshold
    }
}

/// The pricing inputs for one product or variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBasis {
    /// Price of a single unit.
    pub unit_price: Decimal,

    /// Regular quantity tier.
    pub quantity_tier: Option<QuantityTier>,

    /// Higher-volume tier, checked before the regular tier.
    pub bulk_tier: Option<QuantityTier>,

    /// Minimum quantity a retailer must order.
    pub min_retailer_quantity: Option<u32>,
}

impl PriceBasis {
    /// Basis with a unit price and no tiers.
    pub const fn new(unit_price: Decimal) -> Self {
        Self {
            unit_price,
            quantity_tier: None,
            bulk_tier: None,
            min_retailer_quantity: None,
        }
    }

    /// Set the regular quantity tier.
    #[must_use]
    pub fn with_quantity_tier(mut self, tier: QuantityTier) -> Self {
        self.quantity_tier = Some(tier);
        self
    }

    /// Set the bulk quantity tier.
    #[must_use]
    pub fn with_bulk_tier(mut self, tier: QuantityTier) -> Self {
        self.bulk_tier = Some(tier);
        self
    }

    /// Set the retailer minimum order quantity.
    #[must_use]
    pub fn with_min_retailer_quantity(mut self, quantity: u32) -> Self {
        self.min_retailer_quantity = Some(quantity);
        self
    }

    /// The tier that fires for `quantity`. The bulk tier wins when both
    /// thresholds are met.
    pub fn active_tier(&self, quantity: u32) -> Option<&QuantityTier> {
        self.bulk_tier
            .as_ref()
            .filter(|tier| tier.is_met_by(quantity))
            .or_else(|| {
                self.quantity_tier
                    .as_ref()
                    .filter(|tier| tier.is_met_by(quantity))
            })
    }

    /// A non-positive unit price cannot be discounted.
    pub fn is_degenerate(&self) -> bool {
        self.unit_price <= Decimal::ZERO
    }

    /// Whether `quantity` satisfies the retailer minimum, if one is set.
    pub fn meets_retailer_minimum(&self, quantity: u32) -> bool {
        self.min_retailer_quantity
            .is_none_or(|minimum| quantity >= minimum)
    }
}

/// Pricing fields as stored on a product or variant row.
///
/// Every field is optional because a variant only overrides what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPricing {
    /// Unit price.
    pub price: Option<Decimal>,

    /// Regular tier threshold.
    pub discount_quantity: Option<u32>,

    /// Regular tier percentage.
    pub discount_percentage: Option<Decimal>,

    /// Bulk tier threshold.
    pub bulk_discount_quantity: Option<u32>,

    /// Bulk tier percentage.
    pub bulk_discount_percentage: Option<Decimal>,

    /// Retailer minimum order quantity.
    pub min_retailer_quantity: Option<u32>,
}

impl CatalogPricing {
    fn quantity_tier(&self) -> Option<QuantityTier> {
        QuantityTier::new(self.discount_quantity?, self.discount_percentage?)
    }

    fn bulk_tier(&self) -> Option<QuantityTier> {
        QuantityTier::new(self.bulk_discount_quantity?, self.bulk_discount_percentage?)
    }

    fn to_basis(&self, unit_price: Decimal) -> PriceBasis {
        PriceBasis {
            unit_price,
            quantity_tier: self.quantity_tier(),
            bulk_tier: self.bulk_tier(),
            min_retailer_quantity: self.min_retailer_quantity.filter(|minimum| *minimum > 0),
        }
    }
}

/// Pick the price basis for a line.
///
/// A variant that carries its own price supplies the whole basis, tiers
/// included. Otherwise the product does. A product without a price yields a
/// zero unit price, which prices as "no discount".
pub fn resolve_price_basis(product: &CatalogPricing, variant: Option<&CatalogPricing>) -> PriceBasis {
    if let Some(variant) = variant
        && let Some(price) = variant.price
    {
        return variant.to_basis(price);
    }

    product.to_basis(product.price.unwrap_or(Decimal::ZERO))
}
