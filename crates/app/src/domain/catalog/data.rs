//! Catalog Data

use cartwright::basis::CatalogPricing;

use crate::domain::catalog::records::{BrandUuid, CategoryUuid, ProductUuid, VariantUuid};

/// New Brand
#[derive(Debug, Clone)]
pub struct NewBrand {
    pub uuid: BrandUuid,
    pub name: String,
}

/// New Category
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub uuid: CategoryUuid,
    pub name: String,
}

/// New Product
///
/// `pricing.price` is required for products.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub brand_uuid: Option<BrandUuid>,
    pub category_uuid: Option<CategoryUuid>,
    pub pricing: CatalogPricing,
    pub stock: u32,
    pub is_active: bool,
}

/// New Product Variant
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub uuid: VariantUuid,
    pub product_uuid: ProductUuid,
    pub name: String,
    pub pricing: CatalogPricing,
    pub stock: u32,
}

/// Product Availability
#[derive(Debug, Clone, Copy)]
pub struct ProductAvailability {
    pub stock: u32,
    pub is_active: bool,
}
