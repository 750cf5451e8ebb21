//! Cart Items Repository

use cartwright::{coupons::DiscountKind, lines::PricedLine};
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    carts::{
        data::NewCartItem,
        records::{CartItemRecord, CartItemUuid, CartUuid},
    },
    catalog::records::{ProductUuid, VariantUuid},
    columns::{try_get_count, try_get_optional_count, try_i32_from_u32, try_optional_i32_from_u32},
    coupons::records::CouponUuid,
};

const UPSERT_CART_ITEM_SQL: &str = include_str!("../sql/upsert_cart_item.sql");
const GET_CART_ITEM_SQL: &str = include_str!("../sql/get_cart_item.sql");
const LIST_CART_ITEMS_SQL: &str = include_str!("../sql/list_cart_items.sql");
const LOCK_CATALOG_CART_ITEMS_SQL: &str = include_str!("../sql/lock_catalog_cart_items.sql");
const WRITE_CART_ITEM_PRICING_SQL: &str = include_str!("../sql/write_cart_item_pricing.sql");
const DELETE_CART_ITEM_SQL: &str = include_str!("../sql/delete_cart_item.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartItemsRepository;

impl PgCartItemsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Insert a line, or add to the quantity of the existing line for the same
    /// product and variant. The row stays locked until the transaction ends.
    pub(crate) async fn upsert_cart_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        item: &NewCartItem,
    ) -> Result<CartItemRecord, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(UPSERT_CART_ITEM_SQL)
            .bind(item.uuid.into_uuid())
            .bind(cart.into_uuid())
            .bind(item.product_uuid.into_uuid())
            .bind(item.product_variant_uuid.map(VariantUuid::into_uuid))
            .bind(try_i32_from_u32(item.quantity, "total_quantity")?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_cart_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        item: CartItemUuid,
    ) -> Result<Option<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(GET_CART_ITEM_SQL)
            .bind(item.into_uuid())
            .bind(cart.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn list_cart_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
    ) -> Result<Vec<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(LIST_CART_ITEMS_SQL)
            .bind(cart.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Lines in any cart that reference `product`, or only `variant` of it,
    /// locked in `uuid` order until the transaction ends.
    pub(crate) async fn lock_catalog_cart_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variant: Option<VariantUuid>,
    ) -> Result<Vec<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(LOCK_CATALOG_CART_ITEMS_SQL)
            .bind(product.into_uuid())
            .bind(variant.map(VariantUuid::into_uuid))
            .fetch_all(&mut **tx)
            .await
    }

    /// Write a freshly priced line if nobody has written it since `version`
    /// was read. `None` means the compare failed.
    pub(crate) async fn write_pricing(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        item: &CartItemRecord,
        priced: &PricedLine,
        coupon: Option<CouponUuid>,
    ) -> Result<Option<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(WRITE_CART_ITEM_PRICING_SQL)
            .bind(item.uuid.into_uuid())
            .bind(item.version)
            .bind(try_i32_from_u32(priced.total_quantity, "total_quantity")?)
            .bind(priced.price_at_time)
            .bind(try_optional_i32_from_u32(
                priced.discount_quantity,
                "discount_quantity",
            )?)
            .bind(priced.discount_applied)
            .bind(priced.discount_type.map(DiscountKind::as_str))
            .bind(priced.final_price)
            .bind(coupon.map(CouponUuid::into_uuid))
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn delete_cart_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        item: CartItemUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CART_ITEM_SQL)
            .bind(item.into_uuid())
            .bind(cart.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn try_get_discount_type(row: &PgRow) -> Result<Option<DiscountKind>, sqlx::Error> {
    let value: Option<String> = row.try_get("discount_type")?;

    value
        .map(|value| {
            value.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "discount_type".to_string(),
                source: Box::new(e),
            })
        })
        .transpose()
}

impl<'r> FromRow<'r, PgRow> for CartItemRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CartItemUuid::from_uuid(row.try_get("uuid")?),
            cart_uuid: CartUuid::from_uuid(row.try_get("cart_uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            product_variant_uuid: row
                .try_get::<Option<Uuid>, _>("product_variant_uuid")?
                .map(VariantUuid::from_uuid),
            total_quantity: try_get_count(row, "total_quantity")?,
            price_at_time: row.try_get("price_at_time")?,
            discount_quantity: try_get_optional_count(row, "discount_quantity")?,
            discount_applied: row.try_get("discount_applied")?,
            discount_type: try_get_discount_type(row)?,
            final_price: row.try_get("final_price")?,
            coupon_uuid: row
                .try_get::<Option<Uuid>, _>("coupon_uuid")?
                .map(CouponUuid::from_uuid),
            version: row.try_get("version")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
