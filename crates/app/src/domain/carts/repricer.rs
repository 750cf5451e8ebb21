//! Line Repricer
//!
//! Every write of a cart line's economics goes through here, whether the line
//! changed or the catalog underneath it did.

use cartwright::coupons::{CouponPolicy, Role};
use jiff::Timestamp;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};

use crate::domain::{
    carts::{
        errors::CartsServiceError,
        pricer::price_item,
        records::CartItemRecord,
        repositories::PgCartItemsRepository,
    },
    catalog::{
        records::{LineCatalog, ProductUuid, VariantUuid},
        repository::PgCatalogRepository,
    },
    coupons::{records::CouponUuid, repository::PgCouponsRepository},
};

/// What a stored line is priced with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineWrite<'a> {
    pub(crate) quantity: u32,

    /// The coupon left attached to the line.
    pub(crate) coupon_uuid: Option<CouponUuid>,

    /// Its policy, when the coupon still exists.
    pub(crate) coupon: Option<&'a CouponPolicy>,

    /// Set when the retailer minimum applies to this write.
    pub(crate) minimum_for: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgLineRepricer {
    items_repository: PgCartItemsRepository,
    catalog_repository: PgCatalogRepository,
    coupons_repository: PgCouponsRepository,
}

impl PgLineRepricer {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Policy of an attached coupon. A coupon that has gone away prices as no
    /// coupon.
    pub(crate) async fn attached_policy(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: Option<CouponUuid>,
    ) -> Result<Option<CouponPolicy>, sqlx::Error> {
        let Some(coupon) = coupon else {
            return Ok(None);
        };

        let found = self.coupons_repository.find_coupon(tx, coupon).await?;

        if found.is_none() {
            debug!(coupon_uuid = %coupon, "attached coupon is gone; pricing without it");
        }

        Ok(found.map(|found| found.policy))
    }

    /// Price a stored line and write the result if the row is still at the
    /// version that was read.
    pub(crate) async fn write_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        item: &CartItemRecord,
        line: &LineCatalog,
        write: LineWrite<'_>,
        now: Timestamp,
    ) -> Result<CartItemRecord, CartsServiceError> {
        if matches!(write.minimum_for, Some(Role::Retailer))
            && let Some(minimum) = line.price_basis().min_retailer_quantity
            && write.quantity < minimum
        {
            return Err(CartsServiceError::BelowRetailerMinimum { minimum });
        }

        let priced = price_item(line, write.quantity, write.coupon, now);

        self.items_repository
            .write_pricing(tx, item, &priced, write.coupon_uuid)
            .await?
            .ok_or(CartsServiceError::Conflict)
    }

    /// Re-price every line of `product`, or only of one of its variants, after
    /// its catalog rows changed inside `tx`.
    ///
    /// The lines stay locked until `tx` ends, so nothing reads the new price
    /// next to an old line total. Returns the number of lines written.
    pub(crate) async fn reprice_catalog_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variant: Option<VariantUuid>,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let items = self
            .items_repository
            .lock_catalog_cart_items(tx, product, variant)
            .await?;

        let mut repriced = 0;

        for item in items {
            let Some(line) = self
                .catalog_repository
                .find_line(tx, item.product_uuid, item.product_variant_uuid)
                .await?
            else {
                warn!(item_uuid = %item.uuid, "cart item's variant is gone; skipping");

                continue;
            };

            let policy = self.attached_policy(tx, item.coupon_uuid).await?;
            let priced = price_item(&line, item.total_quantity, policy.as_ref(), now);

            let written = self
                .items_repository
                .write_pricing(tx, &item, &priced, item.coupon_uuid)
                .await?;

            if written.is_some() {
                repriced += 1;
            }
        }

        info!(product_uuid = %product, repriced, "re-priced cart items");

        Ok(repriced)
    }
}
