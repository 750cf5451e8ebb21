//! Catalog Records

use cartwright::{
    basis::{CatalogPricing, PriceBasis, resolve_price_basis},
    coupons::TargetContext,
};
use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// Brand UUID
pub type BrandUuid = TypedUuid<BrandRecord>;

/// Category UUID
pub type CategoryUuid = TypedUuid<CategoryRecord>;

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Product Variant UUID
pub type VariantUuid = TypedUuid<VariantRecord>;

/// Brand Record
#[derive(Debug, Clone)]
pub struct BrandRecord {
    pub uuid: BrandUuid,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Category Record
#[derive(Debug, Clone)]
pub struct CategoryRecord {
    pub uuid: CategoryUuid,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Product Record
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub brand_uuid: Option<BrandUuid>,
    pub category_uuid: Option<CategoryUuid>,
    pub pricing: CatalogPricing,
    pub stock: u32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// Product Variant Record
///
/// Pricing fields are all optional; a variant without a price defers to its
/// product.
#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub uuid: VariantUuid,
    pub product_uuid: ProductUuid,
    pub name: String,
    pub pricing: CatalogPricing,
    pub stock: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// The catalog rows behind one cart line.
#[derive(Debug, Clone)]
pub struct LineCatalog {
    pub product: ProductRecord,
    pub variant: Option<VariantRecord>,
}

impl LineCatalog {
    /// Price basis for the line, variant first.
    #[must_use]
    pub fn price_basis(&self) -> PriceBasis {
        resolve_price_basis(
            &self.product.pricing,
            self.variant.as_ref().map(|variant| &variant.pricing),
        )
    }

    /// Catalog ids a coupon scope is matched against.
    #[must_use]
    pub fn target_context(&self) -> TargetContext {
        TargetContext {
            product: Some(self.product.uuid.into_uuid()),
            product_variant: self.variant.as_ref().map(|variant| variant.uuid.into_uuid()),
            category: self.product.category_uuid.map(CategoryUuid::into_uuid),
            brand: self.product.brand_uuid.map(BrandUuid::into_uuid),
        }
    }

    /// Active and in stock. Variant stock applies when a variant is chosen.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        let stock = self
            .variant
            .as_ref()
            .map_or(self.product.stock, |variant| variant.stock);

        self.product.is_active && stock > 0
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn product(stock: u32, is_active: bool) -> ProductRecord {
        let now = Timestamp::now();

        ProductRecord {
            uuid: ProductUuid::new(),
            name: "Espresso beans".to_string(),
            brand_uuid: Some(BrandUuid::new()),
            category_uuid: None,
            pricing: CatalogPricing {
                price: Some(dec!(24.00)),
                discount_quantity: Some(3),
                discount_percentage: Some(dec!(5)),
                ..CatalogPricing::default()
            },
            stock,
            is_active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn variant(product: &ProductRecord, price: Option<Decimal>, stock: u32) -> VariantRecord {
        VariantRecord {
            uuid: VariantUuid::new(),
            product_uuid: product.uuid,
            name: "1kg".to_string(),
            pricing: CatalogPricing {
                price,
                ..CatalogPricing::default()
            },
            stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
            deleted_at: None,
        }
    }

    #[test]
    fn priced_variant_replaces_product_tiers() {
        let product = product(10, true);
        let variant = variant(&product, Some(dec!(80.00)), 4);

        let line = LineCatalog {
            product,
            variant: Some(variant),
        };

        let basis = line.price_basis();

        assert_eq!(basis.unit_price, dec!(80.00));
        assert_eq!(basis.quantity_tier, None);
    }

    #[test]
    fn unpriced_variant_defers_to_product() {
        let product = product(10, true);
        let variant = variant(&product, None, 4);

        let line = LineCatalog {
            product,
            variant: Some(variant),
        };

        let basis = line.price_basis();

        assert_eq!(basis.unit_price, dec!(24.00));
        assert!(basis.quantity_tier.is_some());
    }

    #[test]
    fn target_context_carries_every_catalog_id() {
        let product = product(1, true);
        let variant = variant(&product, None, 1);
        let variant_uuid = variant.uuid.into_uuid();
        let brand_uuid = product.brand_uuid.map(BrandUuid::into_uuid);

        let line = LineCatalog {
            product,
            variant: Some(variant),
        };

        let context = line.target_context();

        assert_eq!(context.product_variant, Some(variant_uuid));
        assert_eq!(context.brand, brand_uuid);
        assert_eq!(context.category, None);
    }

    #[test]
    fn variant_stock_decides_purchasability() {
        let product = product(10, true);
        let sold_out = variant(&product, None, 0);

        let with_variant = LineCatalog {
            product: product.clone(),
            variant: Some(sold_out),
        };

        assert!(!with_variant.is_purchasable());

        let inactive = LineCatalog {
            product: ProductRecord {
                is_active: false,
                ..product
            },
            variant: None,
        };

        assert!(!inactive.is_purchasable());
    }
}
