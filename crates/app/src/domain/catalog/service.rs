//! Catalog service.

use async_trait::async_trait;
use cartwright::basis::{CatalogPricing, PriceBasis};
use jiff::Timestamp;
use mockall::automock;
use tracing::info;

use crate::{
    database::Db,
    domain::{
        carts::repricer::PgLineRepricer,
        catalog::{
            data::{NewBrand, NewCategory, NewProduct, NewVariant, ProductAvailability},
            errors::CatalogServiceError,
            records::{
                BrandRecord, CategoryRecord, LineCatalog, ProductRecord, ProductUuid,
                VariantRecord, VariantUuid,
            },
            repository::PgCatalogRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgCatalogService {
    db: Db,
    repository: PgCatalogRepository,
    repricer: PgLineRepricer,
}

impl PgCatalogService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCatalogRepository::new(),
            repricer: PgLineRepricer::new(),
        }
    }
}

#[async_trait]
impl CatalogService for PgCatalogService {
    async fn create_brand(&self, brand: NewBrand) -> Result<BrandRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_brand(&mut tx, brand).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn create_category(
        &self,
        category: NewCategory,
    ) -> Result<CategoryRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_category(&mut tx, category).await?;

        tx.commit().await?;

        Ok(created)
    }

    #[tracing::instrument(
        name = "catalog.service.create_product",
        skip(self, product),
        fields(product_uuid = %product.uuid),
        err
    )]
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_product(&mut tx, product).await?;

        tx.commit().await?;

        info!(product_uuid = %created.uuid, "created product");

        Ok(created)
    }

    #[tracing::instrument(
        name = "catalog.service.create_variant",
        skip(self, variant),
        fields(product_uuid = %variant.product_uuid, variant_uuid = %variant.uuid),
        err
    )]
    async fn create_variant(
        &self,
        variant: NewVariant,
    ) -> Result<VariantRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_variant(&mut tx, variant).await?;

        tx.commit().await?;

        info!(variant_uuid = %created.uuid, "created product variant");

        Ok(created)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self.repository.find_product(&mut tx, product).await?;

        tx.commit().await?;

        found.ok_or(CatalogServiceError::NotFound)
    }

    #[tracing::instrument(
        name = "catalog.service.update_product_pricing",
        skip(self, pricing),
        fields(product_uuid = %product),
        err
    )]
    async fn update_product_pricing(
        &self,
        product: ProductUuid,
        pricing: CatalogPricing,
    ) -> Result<ProductRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let updated = self
            .repository
            .update_product_pricing(&mut tx, product, &pricing)
            .await?;

        let repriced = self
            .repricer
            .reprice_catalog_lines(&mut tx, product, None, Timestamp::now())
            .await?;

        tx.commit().await?;

        info!(repriced, "updated product pricing");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "catalog.service.update_variant_pricing",
        skip(self, pricing),
        fields(variant_uuid = %variant),
        err
    )]
    async fn update_variant_pricing(
        &self,
        variant: VariantUuid,
        pricing: CatalogPricing,
    ) -> Result<VariantRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let updated = self
            .repository
            .update_variant_pricing(&mut tx, variant, &pricing)
            .await?;

        let repriced = self
            .repricer
            .reprice_catalog_lines(
                &mut tx,
                updated.product_uuid,
                Some(updated.uuid),
                Timestamp::now(),
            )
            .await?;

        tx.commit().await?;

        info!(repriced, "updated product variant pricing");

        Ok(updated)
    }

    async fn update_product_availability(
        &self,
        product: ProductUuid,
        availability: ProductAvailability,
    ) -> Result<ProductRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let updated = self
            .repository
            .update_product_availability(&mut tx, product, availability)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }

    #[tracing::instrument(
        name = "catalog.service.delete_product",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    async fn delete_product(&self, product: ProductUuid) -> Result<(), CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.repository.delete_product(&mut tx, product).await?;

        if rows_affected == 0 {
            return Err(CatalogServiceError::NotFound);
        }

        tx.commit().await?;

        info!("deleted product");

        Ok(())
    }

    async fn get_line(
        &self,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<LineCatalog, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let line = self.repository.find_line(&mut tx, product, variant).await?;

        tx.commit().await?;

        line.ok_or(CatalogServiceError::NotFound)
    }

    async fn get_price_basis(
        &self,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<PriceBasis, CatalogServiceError> {
        let line = self.get_line(product, variant).await?;

        Ok(line.price_basis())
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Create a brand.
    async fn create_brand(&self, brand: NewBrand) -> Result<BrandRecord, CatalogServiceError>;

    /// Create a category.
    async fn create_category(
        &self,
        category: NewCategory,
    ) -> Result<CategoryRecord, CatalogServiceError>;

    /// Create a product with its price and discount tiers.
    async fn create_product(&self, product: NewProduct)
    -> Result<ProductRecord, CatalogServiceError>;

    /// Create a variant under an existing product.
    async fn create_variant(&self, variant: NewVariant)
    -> Result<VariantRecord, CatalogServiceError>;

    /// Retrieve a product that has not been deleted.
    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, CatalogServiceError>;

    /// Replace a product's price and discount tiers, re-pricing every cart
    /// line for the product and its variants in the same transaction.
    async fn update_product_pricing(
        &self,
        product: ProductUuid,
        pricing: CatalogPricing,
    ) -> Result<ProductRecord, CatalogServiceError>;

    /// Replace a variant's price and discount tiers, re-pricing its cart lines
    /// in the same transaction.
    async fn update_variant_pricing(
        &self,
        variant: VariantUuid,
        pricing: CatalogPricing,
    ) -> Result<VariantRecord, CatalogServiceError>;

    /// Set stock and the active flag.
    async fn update_product_availability(
        &self,
        product: ProductUuid,
        availability: ProductAvailability,
    ) -> Result<ProductRecord, CatalogServiceError>;

    /// Soft-delete a product together with its variants.
    async fn delete_product(&self, product: ProductUuid) -> Result<(), CatalogServiceError>;

    /// Product and optional variant behind a cart line.
    async fn get_line(
        &self,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<LineCatalog, CatalogServiceError>;

    /// Price basis for a product, or for one of its variants.
    async fn get_price_basis(
        &self,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<PriceBasis, CatalogServiceError>;
}
