//! Catalog Repository

use cartwright::basis::CatalogPricing;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    catalog::{
        data::{NewBrand, NewCategory, NewProduct, NewVariant, ProductAvailability},
        records::{
            BrandRecord, BrandUuid, CategoryRecord, CategoryUuid, LineCatalog, ProductRecord,
            ProductUuid, VariantRecord, VariantUuid,
        },
    },
    columns::{try_get_count, try_get_optional_count, try_i32_from_u32, try_optional_i32_from_u32},
};

const CREATE_BRAND_SQL: &str = include_str!("sql/create_brand.sql");
const CREATE_CATEGORY_SQL: &str = include_str!("sql/create_category.sql");
const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const UPDATE_PRODUCT_PRICING_SQL: &str = include_str!("sql/update_product_pricing.sql");
const UPDATE_PRODUCT_AVAILABILITY_SQL: &str = include_str!("sql/update_product_availability.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const DELETE_PRODUCT_VARIANTS_SQL: &str = include_str!("sql/delete_product_variants.sql");
const CREATE_VARIANT_SQL: &str = include_str!("sql/create_variant.sql");
const GET_VARIANT_SQL: &str = include_str!("sql/get_variant.sql");
const UPDATE_VARIANT_PRICING_SQL: &str = include_str!("sql/update_variant_pricing.sql");
const SHARE_PRODUCT_SQL: &str = include_str!("sql/share_product.sql");
const SHARE_VARIANT_SQL: &str = include_str!("sql/share_variant.sql");

/// Integer pricing columns, converted for binding.
struct PricingParams {
    discount_quantity: Option<i32>,
    bulk_discount_quantity: Option<i32>,
    min_retailer_quantity: Option<i32>,
}

impl PricingParams {
    fn try_from_pricing(pricing: &CatalogPricing) -> Result<Self, sqlx::Error> {
        Ok(Self {
            discount_quantity: try_optional_i32_from_u32(
                pricing.discount_quantity,
                "discount_quantity",
            )?,
            bulk_discount_quantity: try_optional_i32_from_u32(
                pricing.bulk_discount_quantity,
                "bulk_discount_quantity",
            )?,
            min_retailer_quantity: try_optional_i32_from_u32(
                pricing.min_retailer_quantity,
                "min_retailer_quantity",
            )?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCatalogRepository;

impl PgCatalogRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_brand(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        brand: NewBrand,
    ) -> Result<BrandRecord, sqlx::Error> {
        query_as::<Postgres, BrandRecord>(CREATE_BRAND_SQL)
            .bind(brand.uuid.into_uuid())
            .bind(brand.name)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_category(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        category: NewCategory,
    ) -> Result<CategoryRecord, sqlx::Error> {
        query_as::<Postgres, CategoryRecord>(CREATE_CATEGORY_SQL)
            .bind(category.uuid.into_uuid())
            .bind(category.name)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: NewProduct,
    ) -> Result<ProductRecord, sqlx::Error> {
        let params = PricingParams::try_from_pricing(&product.pricing)?;

        query_as::<Postgres, ProductRecord>(CREATE_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(product.name)
            .bind(product.brand_uuid.map(BrandUuid::into_uuid))
            .bind(product.category_uuid.map(CategoryUuid::into_uuid))
            .bind(product.pricing.price)
            .bind(params.discount_quantity)
            .bind(product.pricing.discount_percentage)
            .bind(params.bulk_discount_quantity)
            .bind(product.pricing.bulk_discount_percentage)
            .bind(params.min_retailer_quantity)
            .bind(try_i32_from_u32(product.stock, "stock")?)
            .bind(product.is_active)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Option<ProductRecord>, sqlx::Error> {
        query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn update_product_pricing(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        pricing: &CatalogPricing,
    ) -> Result<ProductRecord, sqlx::Error> {
        let params = PricingParams::try_from_pricing(pricing)?;

        query_as::<Postgres, ProductRecord>(UPDATE_PRODUCT_PRICING_SQL)
            .bind(product.into_uuid())
            .bind(pricing.price)
            .bind(params.discount_quantity)
            .bind(pricing.discount_percentage)
            .bind(params.bulk_discount_quantity)
            .bind(pricing.bulk_discount_percentage)
            .bind(params.min_retailer_quantity)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_product_availability(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        availability: ProductAvailability,
    ) -> Result<ProductRecord, sqlx::Error> {
        query_as::<Postgres, ProductRecord>(UPDATE_PRODUCT_AVAILABILITY_SQL)
            .bind(product.into_uuid())
            .bind(try_i32_from_u32(availability.stock, "stock")?)
            .bind(availability.is_active)
            .fetch_one(&mut **tx)
            .await
    }

    /// Soft-delete a product and its variants. Returns the product rows touched.
    pub(crate) async fn delete_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if rows_affected > 0 {
            query(DELETE_PRODUCT_VARIANTS_SQL)
                .bind(product.into_uuid())
                .execute(&mut **tx)
                .await?;
        }

        Ok(rows_affected)
    }

    pub(crate) async fn create_variant(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: NewVariant,
    ) -> Result<VariantRecord, sqlx::Error> {
        let params = PricingParams::try_from_pricing(&variant.pricing)?;

        query_as::<Postgres, VariantRecord>(CREATE_VARIANT_SQL)
            .bind(variant.uuid.into_uuid())
            .bind(variant.product_uuid.into_uuid())
            .bind(variant.name)
            .bind(variant.pricing.price)
            .bind(params.discount_quantity)
            .bind(variant.pricing.discount_percentage)
            .bind(params.bulk_discount_quantity)
            .bind(variant.pricing.bulk_discount_percentage)
            .bind(params.min_retailer_quantity)
            .bind(try_i32_from_u32(variant.stock, "stock")?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_variant_pricing(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: VariantUuid,
        pricing: &CatalogPricing,
    ) -> Result<VariantRecord, sqlx::Error> {
        let params = PricingParams::try_from_pricing(pricing)?;

        query_as::<Postgres, VariantRecord>(UPDATE_VARIANT_PRICING_SQL)
            .bind(variant.into_uuid())
            .bind(pricing.price)
            .bind(params.discount_quantity)
            .bind(pricing.discount_percentage)
            .bind(params.bulk_discount_quantity)
            .bind(pricing.bulk_discount_percentage)
            .bind(params.min_retailer_quantity)
            .fetch_one(&mut **tx)
            .await
    }

    /// Product and optional variant behind a cart line. `None` when either is
    /// missing or deleted.
    pub(crate) async fn find_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<Option<LineCatalog>, sqlx::Error> {
        fetch_line(tx, product, variant, GET_PRODUCT_SQL, GET_VARIANT_SQL).await
    }

    /// [`Self::find_line`], holding a share lock on the rows until the
    /// transaction ends. Pricing updates wait for lines being priced from the
    /// old rows, and vice versa.
    pub(crate) async fn share_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<Option<LineCatalog>, sqlx::Error> {
        fetch_line(tx, product, variant, SHARE_PRODUCT_SQL, SHARE_VARIANT_SQL).await
    }
}

/// Variants only resolve under their own product.
async fn fetch_line(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductUuid,
    variant: Option<VariantUuid>,
    product_sql: &'static str,
    variant_sql: &'static str,
) -> Result<Option<LineCatalog>, sqlx::Error> {
    let Some(product) = query_as::<Postgres, ProductRecord>(product_sql)
        .bind(product.into_uuid())
        .fetch_optional(&mut **tx)
        .await?
    else {
        return Ok(None);
    };

    let variant = match variant {
        Some(variant) => {
            let found = query_as::<Postgres, VariantRecord>(variant_sql)
                .bind(variant.into_uuid())
                .bind(product.uuid.into_uuid())
                .fetch_optional(&mut **tx)
                .await?;

            match found {
                Some(found) => Some(found),
                None => return Ok(None),
            }
        }
        None => None,
    };

    Ok(Some(LineCatalog { product, variant }))
}

fn try_get_pricing(row: &PgRow) -> Result<CatalogPricing, sqlx::Error> {
    Ok(CatalogPricing {
        price: row.try_get("price")?,
        discount_quantity: try_get_optional_count(row, "discount_quantity")?,
        discount_percentage: row.try_get("discount_percentage")?,
        bulk_discount_quantity: try_get_optional_count(row, "bulk_discount_quantity")?,
        bulk_discount_percentage: row.try_get("bulk_discount_percentage")?,
        min_retailer_quantity: try_get_optional_count(row, "min_retailer_quantity")?,
    })
}

impl<'r> FromRow<'r, PgRow> for BrandRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: BrandUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CategoryRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CategoryUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            brand_uuid: row
                .try_get::<Option<Uuid>, _>("brand_uuid")?
                .map(BrandUuid::from_uuid),
            category_uuid: row
                .try_get::<Option<Uuid>, _>("category_uuid")?
                .map(CategoryUuid::from_uuid),
            pricing: try_get_pricing(row)?,
            stock: try_get_count(row, "stock")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            deleted_at: row
                .try_get::<Option<SqlxTimestamp>, _>("deleted_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for VariantRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: VariantUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            name: row.try_get("name")?,
            pricing: try_get_pricing(row)?,
            stock: try_get_count(row, "stock")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            deleted_at: row
                .try_get::<Option<SqlxTimestamp>, _>("deleted_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
