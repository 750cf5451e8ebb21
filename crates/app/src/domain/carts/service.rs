//! Carts service.

use async_trait::async_trait;
use cartwright::coupons::Role;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashMap;
use sqlx::{Postgres, Transaction};
use tracing::{info, warn};

use crate::{
    database::Db,
    domain::{
        carts::{
            data::{CartSettings, NewCartItem},
            errors::CartsServiceError,
            pricer::{is_stale, retry_on_conflict},
            records::{CartItemRecord, CartItemUuid},
            repositories::{PgCartItemsRepository, PgCartsRepository},
            repricer::{LineWrite, PgLineRepricer},
            views::{AvailableCouponView, CartLineView, CartView},
        },
        catalog::{
            records::{LineCatalog, ProductUuid},
            repository::PgCatalogRepository,
        },
        coupons::{
            records::{CouponRecord, CouponUuid},
            repository::PgCouponsRepository,
        },
        users::{records::UserUuid, repository::PgUsersRepository},
    },
};

/// A change to one cart line that calls for a re-price.
#[derive(Debug, Clone, Copy)]
enum LineEdit {
    Quantity(u32),
    AttachCoupon(CouponUuid),
    DetachCoupon,
    Reprice,
}

#[derive(Debug, Clone)]
pub struct PgCartsService {
    db: Db,
    settings: CartSettings,
    carts_repository: PgCartsRepository,
    items_repository: PgCartItemsRepository,
    catalog_repository: PgCatalogRepository,
    coupons_repository: PgCouponsRepository,
    users_repository: PgUsersRepository,
    repricer: PgLineRepricer,
}

impl PgCartsService {
    #[must_use]
    pub fn new(db: Db, settings: CartSettings) -> Self {
        Self {
            db,
            settings,
            carts_repository: PgCartsRepository::new(),
            items_repository: PgCartItemsRepository::new(),
            catalog_repository: PgCatalogRepository::new(),
            coupons_repository: PgCouponsRepository::new(),
            users_repository: PgUsersRepository::new(),
            repricer: PgLineRepricer::new(),
        }
    }

    async fn user_role(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Role, CartsServiceError> {
        self.users_repository
            .find_user(tx, user)
            .await?
            .map(|found| found.role)
            .ok_or(CartsServiceError::UserNotFound)
    }

    /// A line in the user's cart. Lines in other carts are not found.
    async fn user_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<CartItemRecord, CartsServiceError> {
        let cart = self
            .carts_repository
            .find_user_cart(tx, user)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        self.items_repository
            .find_cart_item(tx, cart.uuid, item)
            .await?
            .ok_or(CartsServiceError::NotFound)
    }

    /// Catalog rows behind a line that is about to be priced, share-locked.
    async fn line_catalog(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        item: &CartItemRecord,
    ) -> Result<LineCatalog, CartsServiceError> {
        self.catalog_repository
            .share_line(tx, item.product_uuid, item.product_variant_uuid)
            .await?
            .ok_or(CartsServiceError::NotFound)
    }

    /// One read-modify-write of a line in the user's cart.
    async fn apply_edit(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        edit: LineEdit,
    ) -> Result<CartItemRecord, CartsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        let role = self.user_role(&mut tx, user).await?;
        let stored = self.user_item(&mut tx, user, item).await?;
        let line = self.line_catalog(&mut tx, &stored).await?;

        let (quantity, coupon_uuid, minimum_for) = match edit {
            LineEdit::Quantity(quantity) => (quantity, stored.coupon_uuid, Some(role)),
            LineEdit::AttachCoupon(coupon) => (stored.total_quantity, Some(coupon), None),
            LineEdit::DetachCoupon => (stored.total_quantity, None, None),
            LineEdit::Reprice => (stored.total_quantity, stored.coupon_uuid, None),
        };

        let policy = match edit {
            LineEdit::AttachCoupon(coupon) => {
                let found = self
                    .coupons_repository
                    .find_coupon(&mut tx, coupon)
                    .await?
                    .ok_or(CartsServiceError::CouponNotFound)?;

                if !self
                    .coupons_repository
                    .has_claim(&mut tx, coupon, user)
                    .await?
                {
                    return Err(CartsServiceError::CouponNotClaimed);
                }

                Some(found.policy)
            }
            _ => self.repricer.attached_policy(&mut tx, coupon_uuid).await?,
        };

        let write = LineWrite {
            quantity,
            coupon_uuid,
            coupon: policy.as_ref(),
            minimum_for,
        };

        let written = self
            .repricer
            .write_line(&mut tx, &stored, &line, write, now)
            .await?;

        tx.commit().await?;

        Ok(written)
    }

    async fn edit_line(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        edit: LineEdit,
    ) -> Result<CartItemRecord, CartsServiceError> {
        retry_on_conflict(self.settings.reprice_attempts, move || {
            self.apply_edit(user, item, edit)
        })
        .await
    }
}

#[async_trait]
impl CartsService for PgCartsService {
    #[tracing::instrument(
        name = "carts.service.add_item",
        skip(self, item),
        fields(
            user_uuid = %user,
            product_uuid = %item.product_uuid,
            quantity = item.quantity
        ),
        err
    )]
    async fn add_item(
        &self,
        user: UserUuid,
        item: NewCartItem,
    ) -> Result<CartItemRecord, CartsServiceError> {
        if item.quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        let role = self.user_role(&mut tx, user).await?;

        let line = self
            .catalog_repository
            .share_line(&mut tx, item.product_uuid, item.product_variant_uuid)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let cart = self
            .carts_repository
            .get_or_create_cart(&mut tx, user)
            .await?;

        // The upsert holds the row lock until commit, so concurrent adds to
        // the same line queue behind this one.
        let stored = self
            .items_repository
            .upsert_cart_item(&mut tx, cart.uuid, &item)
            .await?;

        let policy = self
            .repricer
            .attached_policy(&mut tx, stored.coupon_uuid)
            .await?;

        let write = LineWrite {
            quantity: stored.total_quantity,
            coupon_uuid: stored.coupon_uuid,
            coupon: policy.as_ref(),
            minimum_for: Some(role),
        };

        let written = self
            .repricer
            .write_line(&mut tx, &stored, &line, write, now)
            .await?;

        tx.commit().await?;

        info!(
            item_uuid = %written.uuid,
            total_quantity = written.total_quantity,
            final_price = %written.final_price,
            "added cart item"
        );

        Ok(written)
    }

    #[tracing::instrument(
        name = "carts.service.update_quantity",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn update_quantity(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartItemRecord, CartsServiceError> {
        if quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let written = self
            .edit_line(user, item, LineEdit::Quantity(quantity))
            .await?;

        info!(final_price = %written.final_price, "updated cart item quantity");

        Ok(written)
    }

    #[tracing::instrument(
        name = "carts.service.attach_coupon",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item, coupon_uuid = %coupon),
        err
    )]
    async fn attach_coupon(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        coupon: CouponUuid,
    ) -> Result<CartItemRecord, CartsServiceError> {
        let written = self
            .edit_line(user, item, LineEdit::AttachCoupon(coupon))
            .await?;

        info!(final_price = %written.final_price, "attached coupon to cart item");

        Ok(written)
    }

    #[tracing::instrument(
        name = "carts.service.detach_coupon",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn detach_coupon(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<CartItemRecord, CartsServiceError> {
        let written = self.edit_line(user, item, LineEdit::DetachCoupon).await?;

        info!(final_price = %written.final_price, "detached coupon from cart item");

        Ok(written)
    }

    #[tracing::instrument(
        name = "carts.service.remove_item",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn remove_item(&self, user: UserUuid, item: CartItemUuid) -> Result<(), CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let cart = self
            .carts_repository
            .find_user_cart(&mut tx, user)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let rows_affected = self
            .items_repository
            .delete_cart_item(&mut tx, cart.uuid, item)
            .await?;

        if rows_affected == 0 {
            return Err(CartsServiceError::NotFound);
        }

        tx.commit().await?;

        info!("removed cart item");

        Ok(())
    }

    #[tracing::instrument(
        name = "carts.service.reprice_item",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn reprice_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<CartItemRecord, CartsServiceError> {
        self.edit_line(user, item, LineEdit::Reprice).await
    }

    #[tracing::instrument(
        name = "carts.service.reprice_product",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    async fn reprice_product(&self, product: ProductUuid) -> Result<u64, CartsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        self.catalog_repository
            .find_product(&mut tx, product)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let repriced = self
            .repricer
            .reprice_catalog_lines(&mut tx, product, None, now)
            .await?;

        tx.commit().await?;

        Ok(repriced)
    }

    #[tracing::instrument(name = "carts.service.get_cart", skip(self), fields(user_uuid = %user), err)]
    async fn get_cart(&self, user: UserUuid) -> Result<CartView, CartsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        let role = self.user_role(&mut tx, user).await?;

        let available: Vec<AvailableCouponView> = self
            .coupons_repository
            .list_live_coupons(&mut tx, now)
            .await?
            .iter()
            .filter(|coupon| coupon.policy.is_available_to(role, now))
            .map(AvailableCouponView::from)
            .collect();

        let Some(cart) = self.carts_repository.find_user_cart(&mut tx, user).await? else {
            tx.commit().await?;

            return Ok(CartView::new(
                None,
                user,
                Vec::new(),
                available,
                self.settings.tax_rate,
            ));
        };

        let items = self
            .items_repository
            .list_cart_items(&mut tx, cart.uuid)
            .await?;

        let mut coupons: FxHashMap<CouponUuid, Option<CouponRecord>> = FxHashMap::default();
        let mut lines = Vec::with_capacity(items.len());

        for item in &items {
            let catalog = self
                .catalog_repository
                .find_line(&mut tx, item.product_uuid, item.product_variant_uuid)
                .await?;

            let coupon = match item.coupon_uuid {
                Some(uuid) => {
                    if !coupons.contains_key(&uuid) {
                        let found = self.coupons_repository.find_coupon(&mut tx, uuid).await?;

                        coupons.insert(uuid, found);
                    }

                    coupons.get(&uuid).and_then(Option::as_ref)
                }
                None => None,
            };

            let stale = catalog.as_ref().is_some_and(|catalog| {
                is_stale(item, catalog, coupon.map(|coupon| &coupon.policy), now)
            });

            if stale {
                warn!(
                    item_uuid = %item.uuid,
                    final_price = %item.final_price,
                    "persisted cart item price disagrees with a fresh derivation"
                );
            }

            lines.push(CartLineView::new(item, catalog.as_ref(), coupon, stale));
        }

        tx.commit().await?;

        Ok(CartView::new(
            Some(cart.uuid),
            user,
            lines,
            available,
            self.settings.tax_rate,
        ))
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Add a product or variant to the user's cart, creating the cart on first
    /// use. Adding a line that is already in the cart increases its quantity.
    async fn add_item(
        &self,
        user: UserUuid,
        item: NewCartItem,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Set a line's quantity and re-price it.
    async fn update_quantity(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Attach a coupon the user has claimed and re-price the line.
    async fn attach_coupon(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        coupon: CouponUuid,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Detach the line's coupon and re-price it.
    async fn detach_coupon(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Remove a line from the user's cart.
    async fn remove_item(&self, user: UserUuid, item: CartItemUuid) -> Result<(), CartsServiceError>;

    /// Re-price a line against the current catalog and coupon state.
    async fn reprice_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Re-price every cart line for a product and its variants. Catalog
    /// pricing updates already run this pass; this entry point re-runs it.
    /// Returns the number of lines written.
    async fn reprice_product(&self, product: ProductUuid) -> Result<u64, CartsServiceError>;

    /// The user's cart with totals and the coupons on offer. Never writes.
    async fn get_cart(&self, user: UserUuid) -> Result<CartView, CartsServiceError>;
}

#[cfg(test)]
mod tests {
    use cartwright::{
        basis::CatalogPricing,
        coupons::{CouponTarget, DiscountKind, TargetContext},
    };
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::{
        domain::{
            catalog::{CatalogService, data::ProductAvailability},
            coupons::CouponsService,
        },
        test::{TestContext, helpers::coupon_policy},
    };

    use super::*;

    fn tiered_pricing() -> CatalogPricing {
        CatalogPricing {
            price: Some(dec!(100)),
            discount_quantity: Some(5),
            discount_percentage: Some(dec!(10)),
            bulk_discount_quantity: Some(10),
            bulk_discount_percentage: Some(dec!(20)),
            min_retailer_quantity: None,
        }
    }

    fn new_item(product: ProductUuid, quantity: u32) -> NewCartItem {
        NewCartItem {
            uuid: CartItemUuid::new(),
            product_uuid: product,
            product_variant_uuid: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn add_item_prices_the_quantity_tier() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 5)).await?;

        assert_eq!(item.total_quantity, 5);
        assert_eq!(item.price_at_time, dec!(100));
        assert_eq!(item.discount_quantity, Some(5));
        assert_eq!(item.discount_applied, dec!(50));
        assert_eq!(item.discount_type, Some(DiscountKind::Percentage));
        assert_eq!(item.final_price, dec!(450));

        Ok(())
    }

    #[tokio::test]
    async fn repeat_add_increments_and_reaches_the_bulk_tier() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let first = ctx.carts.add_item(user.uuid, new_item(product.uuid, 5)).await?;
        let second = ctx.carts.add_item(user.uuid, new_item(product.uuid, 5)).await?;

        assert_eq!(second.uuid, first.uuid);
        assert_eq!(second.total_quantity, 10);
        assert_eq!(second.discount_quantity, Some(10));
        assert_eq!(second.discount_applied, dec!(200));
        assert_eq!(second.final_price, dec!(800));
        assert!(second.version > first.version);

        Ok(())
    }

    #[tokio::test]
    async fn variant_lines_are_separate_from_the_product_line() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;
        let variant = ctx.create_variant(product.uuid, Some(dec!(60))).await;

        let plain = ctx.carts.add_item(user.uuid, new_item(product.uuid, 2)).await?;

        let mut with_variant = new_item(product.uuid, 2);
        with_variant.product_variant_uuid = Some(variant.uuid);

        let varied = ctx.carts.add_item(user.uuid, with_variant).await?;

        assert_ne!(plain.uuid, varied.uuid);
        assert_eq!(plain.final_price, dec!(200));
        assert_eq!(varied.price_at_time, dec!(60));
        assert_eq!(varied.final_price, dec!(120));

        Ok(())
    }

    #[tokio::test]
    async fn add_item_rejects_unknown_products_and_zero_quantity() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let unknown = ctx
            .carts
            .add_item(user.uuid, new_item(ProductUuid::new(), 1))
            .await;

        let zero = ctx.carts.add_item(user.uuid, new_item(product.uuid, 0)).await;

        assert!(
            matches!(unknown, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {unknown:?}"
        );
        assert!(
            matches!(zero, Err(CartsServiceError::InvalidQuantity)),
            "expected InvalidQuantity, got {zero:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn retailers_must_meet_the_minimum_quantity() -> TestResult {
        let ctx = TestContext::new().await;
        let retailer = ctx.create_user(Role::Retailer, "shop@example.com").await;
        let customer = ctx.create_user(Role::Customer, "a@example.com").await;

        let product = ctx
            .create_product(CatalogPricing {
                min_retailer_quantity: Some(12),
                ..tiered_pricing()
            })
            .await;

        let short = ctx
            .carts
            .add_item(retailer.uuid, new_item(product.uuid, 6))
            .await;

        assert!(
            matches!(
                short,
                Err(CartsServiceError::BelowRetailerMinimum { minimum: 12 })
            ),
            "expected BelowRetailerMinimum, got {short:?}"
        );

        let item = ctx
            .carts
            .add_item(retailer.uuid, new_item(product.uuid, 12))
            .await?;

        let lowered = ctx.carts.update_quantity(retailer.uuid, item.uuid, 11).await;

        assert!(matches!(
            lowered,
            Err(CartsServiceError::BelowRetailerMinimum { minimum: 12 })
        ));

        ctx.carts
            .add_item(customer.uuid, new_item(product.uuid, 1))
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn claimed_coupon_beats_the_tier_until_detached() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;
        let coupon = ctx
            .create_coupon("SAVE15", coupon_policy(DiscountKind::Percentage, dec!(15))?)
            .await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 5)).await?;

        let unclaimed = ctx.carts.attach_coupon(user.uuid, item.uuid, coupon.uuid).await;

        assert!(
            matches!(unclaimed, Err(CartsServiceError::CouponNotClaimed)),
            "expected CouponNotClaimed, got {unclaimed:?}"
        );

        ctx.coupons
            .claim_coupon(coupon.uuid, user.uuid, TargetContext::default())
            .await?;

        let attached = ctx
            .carts
            .attach_coupon(user.uuid, item.uuid, coupon.uuid)
            .await?;

        assert_eq!(attached.coupon_uuid, Some(coupon.uuid));
        assert_eq!(attached.discount_applied, dec!(75));
        assert_eq!(attached.final_price, dec!(425));

        let detached = ctx.carts.detach_coupon(user.uuid, item.uuid).await?;

        assert_eq!(detached.coupon_uuid, None);
        assert_eq!(detached.final_price, dec!(450));

        Ok(())
    }

    #[tokio::test]
    async fn fixed_coupon_is_not_scaled_by_quantity() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx
            .create_product(CatalogPricing {
                price: Some(dec!(200)),
                ..CatalogPricing::default()
            })
            .await;

        let mut policy = coupon_policy(DiscountKind::Fixed, dec!(50))?;
        policy.target = CouponTarget::Product(product.uuid.into_uuid());

        let coupon = ctx.create_coupon("FIFTY", policy).await;

        ctx.coupons
            .claim_coupon(
                coupon.uuid,
                user.uuid,
                TargetContext {
                    product: Some(product.uuid.into_uuid()),
                    ..TargetContext::default()
                },
            )
            .await?;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 3)).await?;
        let attached = ctx
            .carts
            .attach_coupon(user.uuid, item.uuid, coupon.uuid)
            .await?;

        assert_eq!(attached.discount_applied, dec!(50));
        assert_eq!(attached.discount_type, Some(DiscountKind::Fixed));
        assert_eq!(attached.final_price, dec!(550));

        Ok(())
    }

    #[tokio::test]
    async fn repricing_identical_inputs_changes_only_the_version() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 7)).await?;
        let first = ctx.carts.reprice_item(user.uuid, item.uuid).await?;
        let second = ctx.carts.reprice_item(user.uuid, item.uuid).await?;

        assert_eq!(first.total_quantity, second.total_quantity);
        assert_eq!(first.price_at_time, second.price_at_time);
        assert_eq!(first.discount_quantity, second.discount_quantity);
        assert_eq!(first.discount_applied, second.discount_applied);
        assert_eq!(first.discount_type, second.discount_type);
        assert_eq!(first.final_price, second.final_price);
        assert_eq!(second.version, first.version + 1);

        Ok(())
    }

    #[tokio::test]
    async fn pricing_change_reprices_every_cart_line() -> TestResult {
        let ctx = TestContext::new().await;
        let first = ctx.create_user(Role::Customer, "first@example.com").await;
        let second = ctx.create_user(Role::Customer, "second@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        ctx.carts.add_item(first.uuid, new_item(product.uuid, 5)).await?;
        ctx.carts.add_item(second.uuid, new_item(product.uuid, 1)).await?;

        ctx.catalog
            .update_product_pricing(
                product.uuid,
                CatalogPricing {
                    price: Some(dec!(80)),
                    ..tiered_pricing()
                },
            )
            .await?;

        let cart = ctx.carts.get_cart(first.uuid).await?;
        let line = &cart.items[0];

        assert!(!line.is_stale);
        assert_eq!(line.price_at_time, dec!(80));
        assert_eq!(line.final_price, dec!(360));

        let cart = ctx.carts.get_cart(second.uuid).await?;

        assert!(!cart.items[0].is_stale);
        assert_eq!(cart.items[0].final_price, dec!(80));

        let repriced = ctx.carts.reprice_product(product.uuid).await?;

        assert_eq!(repriced, 2);

        Ok(())
    }

    #[tokio::test]
    async fn edits_racing_a_pricing_change_never_leave_a_stale_line() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 1)).await?;

        let (edit, update) = tokio::join!(
            ctx.carts.update_quantity(user.uuid, item.uuid, 5),
            ctx.catalog.update_product_pricing(
                product.uuid,
                CatalogPricing {
                    price: Some(dec!(80)),
                    ..tiered_pricing()
                },
            ),
        );

        update?;

        assert!(
            matches!(edit, Ok(_) | Err(CartsServiceError::Conflict)),
            "unexpected result {edit:?}"
        );

        let cart = ctx.carts.get_cart(user.uuid).await?;
        let line = &cart.items[0];

        assert!(!line.is_stale);
        assert_eq!(line.price_at_time, dec!(80));

        Ok(())
    }

    #[tokio::test]
    async fn variant_pricing_change_reprices_only_its_lines() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;
        let variant = ctx.create_variant(product.uuid, Some(dec!(60))).await;

        let plain = ctx.carts.add_item(user.uuid, new_item(product.uuid, 2)).await?;
        let varied = ctx
            .carts
            .add_item(
                user.uuid,
                NewCartItem {
                    product_variant_uuid: Some(variant.uuid),
                    ..new_item(product.uuid, 2)
                },
            )
            .await?;

        ctx.catalog
            .update_variant_pricing(
                variant.uuid,
                CatalogPricing {
                    price: Some(dec!(50)),
                    ..CatalogPricing::default()
                },
            )
            .await?;

        let cart = ctx.carts.get_cart(user.uuid).await?;

        let find = |uuid: CartItemUuid| cart.items.iter().find(|line| line.item_uuid == uuid);

        let plain_line = find(plain.uuid).ok_or("plain line missing")?;
        let varied_line = find(varied.uuid).ok_or("variant line missing")?;

        assert_eq!(plain_line.price_at_time, dec!(100));
        assert_eq!(plain_line.final_price, dec!(200));
        assert!(!varied_line.is_stale);
        assert_eq!(varied_line.price_at_time, dec!(50));
        assert_eq!(varied_line.final_price, dec!(100));

        Ok(())
    }

    #[tokio::test]
    async fn get_cart_totals_skip_unpurchasable_lines() -> TestResult {
        let ctx = TestContext::with_settings(CartSettings {
            tax_rate: dec!(10),
            reprice_attempts: 2,
        })
        .await;

        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let kept = ctx.create_product(tiered_pricing()).await;
        let shelved = ctx.create_product(tiered_pricing()).await;

        ctx.carts.add_item(user.uuid, new_item(kept.uuid, 5)).await?;
        ctx.carts.add_item(user.uuid, new_item(shelved.uuid, 2)).await?;

        ctx.catalog
            .update_product_availability(
                shelved.uuid,
                ProductAvailability {
                    stock: 10,
                    is_active: false,
                },
            )
            .await?;

        let cart = ctx.carts.get_cart(user.uuid).await?;

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.subtotal, dec!(450));
        assert_eq!(cart.discount_total, dec!(50));
        assert_eq!(cart.tax, dec!(45));
        assert_eq!(cart.total, dec!(495));
        assert_eq!(
            cart.items.iter().filter(|line| !line.is_purchasable).count(),
            1
        );

        Ok(())
    }

    #[tokio::test]
    async fn get_cart_without_a_cart_is_empty() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;

        ctx.create_coupon("OPEN", coupon_policy(DiscountKind::Fixed, dec!(5))?)
            .await;

        let cart = ctx.carts.get_cart(user.uuid).await?;

        assert_eq!(cart.cart_uuid, None);
        assert!(cart.items.is_empty());
        assert_eq!(cart.total, dec!(0));
        assert_eq!(cart.available_coupons.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn deactivated_coupon_marks_the_line_stale_without_writing() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;
        let coupon = ctx
            .create_coupon("SAVE15", coupon_policy(DiscountKind::Percentage, dec!(15))?)
            .await;

        ctx.coupons
            .claim_coupon(coupon.uuid, user.uuid, TargetContext::default())
            .await?;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 5)).await?;
        let attached = ctx
            .carts
            .attach_coupon(user.uuid, item.uuid, coupon.uuid)
            .await?;

        ctx.coupons.set_coupon_active(coupon.uuid, false).await?;

        let cart = ctx.carts.get_cart(user.uuid).await?;
        let line = &cart.items[0];

        assert!(line.is_stale);
        assert_eq!(line.final_price, dec!(425));
        assert_eq!(line.coupon_code.as_deref(), Some("SAVE15"));

        let repriced = ctx.carts.reprice_item(user.uuid, item.uuid).await?;

        assert_eq!(repriced.coupon_uuid, Some(coupon.uuid));
        assert_eq!(repriced.final_price, dec!(450));
        assert_eq!(repriced.version, attached.version + 1);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_quantity_updates_leave_a_consistent_line() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 1)).await?;

        let (a, b) = tokio::join!(
            ctx.carts.update_quantity(user.uuid, item.uuid, 5),
            ctx.carts.update_quantity(user.uuid, item.uuid, 10),
        );

        for result in [&a, &b] {
            assert!(
                matches!(result, Ok(_) | Err(CartsServiceError::Conflict)),
                "unexpected result {result:?}"
            );
        }

        let cart = ctx.carts.get_cart(user.uuid).await?;
        let line = &cart.items[0];

        let expected = match line.quantity {
            5 => dec!(450),
            10 => dec!(800),
            other => panic!("unexpected quantity {other}"),
        };

        assert_eq!(line.final_price, expected);
        assert!(!line.is_stale);

        Ok(())
    }

    #[tokio::test]
    async fn lines_are_scoped_to_their_owner() -> TestResult {
        let ctx = TestContext::new().await;
        let owner = ctx.create_user(Role::Customer, "owner@example.com").await;
        let other = ctx.create_user(Role::Customer, "other@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(owner.uuid, new_item(product.uuid, 2)).await?;

        ctx.carts.add_item(other.uuid, new_item(product.uuid, 1)).await?;

        let foreign = ctx.carts.update_quantity(other.uuid, item.uuid, 3).await;

        assert!(matches!(foreign, Err(CartsServiceError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn removing_twice_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;
        let product = ctx.create_product(tiered_pricing()).await;

        let item = ctx.carts.add_item(user.uuid, new_item(product.uuid, 2)).await?;

        ctx.carts.remove_item(user.uuid, item.uuid).await?;

        let again = ctx.carts.remove_item(user.uuid, item.uuid).await;

        assert!(
            matches!(again, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {again:?}"
        );

        Ok(())
    }
}
