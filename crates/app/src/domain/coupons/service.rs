//! Coupons service.

use async_trait::async_trait;
use cartwright::{
    coupons::{DiscountKind, TargetContext},
    eligibility::{check_offer, check_usage},
};
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    database::Db,
    domain::{
        coupons::{
            data::NewCoupon,
            errors::CouponsServiceError,
            records::{CouponClaimRecord, CouponRecord, CouponUuid},
            repository::PgCouponsRepository,
        },
        users::{records::UserUuid, repository::PgUsersRepository},
    },
};

#[derive(Debug, Clone)]
pub struct PgCouponsService {
    db: Db,
    repository: PgCouponsRepository,
    users_repository: PgUsersRepository,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCouponsRepository::new(),
            users_repository: PgUsersRepository::new(),
        }
    }
}

/// Reject coupon definitions the pricing rules cannot use.
fn validate_coupon(coupon: &NewCoupon) -> Result<(), CouponsServiceError> {
    let policy = &coupon.policy;

    if coupon.code.trim().is_empty() {
        return Err(CouponsServiceError::InvalidCoupon("code cannot be empty"));
    }

    if policy.valid_to <= policy.valid_from {
        return Err(CouponsServiceError::InvalidCoupon(
            "valid_to must be after valid_from",
        ));
    }

    if policy.value <= Decimal::ZERO {
        return Err(CouponsServiceError::InvalidCoupon(
            "discount value must be positive",
        ));
    }

    if policy.kind == DiscountKind::Percentage && policy.value > Decimal::ONE_HUNDRED {
        return Err(CouponsServiceError::InvalidCoupon(
            "percentage discount cannot exceed 100",
        ));
    }

    let negative = |amount: Option<Decimal>| amount.is_some_and(|amount| amount < Decimal::ZERO);

    if negative(policy.min_cart_value) || negative(policy.max_discount_value) {
        return Err(CouponsServiceError::InvalidCoupon(
            "minimum and maximum values cannot be negative",
        ));
    }

    if policy.usage_limit == Some(0) || policy.usage_per_user == Some(0) {
        return Err(CouponsServiceError::InvalidCoupon(
            "usage limits must be at least 1",
        ));
    }

    Ok(())
}

#[async_trait]
impl CouponsService for PgCouponsService {
    #[tracing::instrument(
        name = "coupons.service.create_coupon",
        skip(self, coupon),
        fields(coupon_uuid = %coupon.uuid, code = %coupon.code),
        err
    )]
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError> {
        validate_coupon(&coupon)?;

        let mut tx = self.db.begin().await?;

        let created = self.repository.create_coupon(&mut tx, coupon).await?;

        tx.commit().await?;

        info!(coupon_uuid = %created.uuid, "created coupon");

        Ok(created)
    }

    async fn get_coupon(&self, coupon: CouponUuid) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self.repository.find_coupon(&mut tx, coupon).await?;

        tx.commit().await?;

        found.ok_or(CouponsServiceError::CouponNotFound)
    }

    async fn get_coupon_by_code(&self, code: &str) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self.repository.find_coupon_by_code(&mut tx, code).await?;

        tx.commit().await?;

        found.ok_or(CouponsServiceError::CouponNotFound)
    }

    async fn set_coupon_active(
        &self,
        coupon: CouponUuid,
        is_active: bool,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let updated = self
            .repository
            .set_coupon_active(&mut tx, coupon, is_active)
            .await?;

        tx.commit().await?;

        info!(coupon_uuid = %coupon, is_active, "updated coupon status");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "coupons.service.claim_coupon",
        skip(self, target),
        fields(coupon_uuid = %coupon, user_uuid = %user)
    )]
    async fn claim_coupon(
        &self,
        coupon: CouponUuid,
        user: UserUuid,
        target: TargetContext,
    ) -> Result<CouponClaimRecord, CouponsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        // Coupon lock first, then user lock; claims never take them in the
        // other order.
        let found = self
            .repository
            .lock_coupon(&mut tx, coupon)
            .await?
            .ok_or(CouponsServiceError::CouponNotFound)?;

        if let Err(reason) = check_offer(&found.policy, &target, now) {
            info!(%reason, "coupon claim denied");

            return Err(reason.into());
        }

        self.users_repository
            .lock_user(&mut tx, user)
            .await?
            .ok_or(CouponsServiceError::UserNotFound)?;

        let usage = self.repository.claim_usage(&mut tx, coupon, user).await?;

        if let Err(reason) = check_usage(&found.policy, &usage) {
            info!(%reason, "coupon claim denied");

            return Err(reason.into());
        }

        let claim = match self.repository.create_claim(&mut tx, coupon, user).await {
            Ok(claim) => claim,
            Err(error) => {
                warn!(%error, "failed to record coupon claim");

                return Err(error.into());
            }
        };

        tx.commit().await?;

        info!(claim_uuid = %claim.uuid, "claimed coupon");

        Ok(claim)
    }

    #[tracing::instrument(
        name = "coupons.service.available_coupons",
        skip(self),
        fields(user_uuid = %user),
        err
    )]
    async fn available_coupons(
        &self,
        user: UserUuid,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError> {
        let now = Timestamp::now();
        let mut tx = self.db.begin().await?;

        let role = self
            .users_repository
            .find_user(&mut tx, user)
            .await?
            .ok_or(CouponsServiceError::UserNotFound)?
            .role;

        let live = self.repository.list_live_coupons(&mut tx, now).await?;

        tx.commit().await?;

        Ok(live
            .into_iter()
            .filter(|coupon| coupon.policy.is_available_to(role, now))
            .collect())
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Create a coupon after checking its window, value and limits.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError>;

    /// Retrieve a coupon.
    async fn get_coupon(&self, coupon: CouponUuid) -> Result<CouponRecord, CouponsServiceError>;

    /// Retrieve a coupon by its code.
    async fn get_coupon_by_code(&self, code: &str) -> Result<CouponRecord, CouponsServiceError>;

    /// Switch a coupon on or off.
    async fn set_coupon_active(
        &self,
        coupon: CouponUuid,
        is_active: bool,
    ) -> Result<CouponRecord, CouponsServiceError>;

    /// Record a claim of `coupon` by `user` if every claim rule passes.
    ///
    /// Rules run in order and the first failure is returned as
    /// [`CouponsServiceError::Denied`]. Claims are permanent.
    async fn claim_coupon(
        &self,
        coupon: CouponUuid,
        user: UserUuid,
        target: TargetContext,
    ) -> Result<CouponClaimRecord, CouponsServiceError>;

    /// Coupons the user could apply right now: active, in window and offered
    /// to the user's role. Advisory only; claims are checked separately.
    async fn available_coupons(
        &self,
        user: UserUuid,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError>;
}

#[cfg(test)]
mod tests {
    use cartwright::{
        coupons::{CouponPolicy, CouponTarget, Role, TargetRole},
        eligibility::DenyReason,
    };
    use jiff::ToSpan;
    use rust_decimal_macros::dec;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::test::{TestContext, helpers::coupon_policy};

    use super::*;

    fn new_coupon(policy: CouponPolicy) -> NewCoupon {
        NewCoupon {
            uuid: CouponUuid::new(),
            code: "SPRING10".to_string(),
            policy,
        }
    }

    #[test]
    fn inverted_window_is_rejected() -> TestResult {
        let mut policy = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        policy.valid_to = policy.valid_from;

        let result = validate_coupon(&new_coupon(policy));

        assert!(matches!(result, Err(CouponsServiceError::InvalidCoupon(_))));

        Ok(())
    }

    #[test]
    fn percentage_over_one_hundred_is_rejected() -> TestResult {
        let policy = coupon_policy(DiscountKind::Percentage, dec!(100.5))?;

        let result = validate_coupon(&new_coupon(policy));

        assert!(matches!(
            result,
            Err(CouponsServiceError::InvalidCoupon(
                "percentage discount cannot exceed 100"
            ))
        ));

        Ok(())
    }

    #[test]
    fn fixed_amount_over_one_hundred_is_fine() -> TestResult {
        let policy = coupon_policy(DiscountKind::Fixed, dec!(250))?;

        assert!(validate_coupon(&new_coupon(policy)).is_ok());

        Ok(())
    }

    #[test]
    fn zero_value_and_zero_limits_are_rejected() -> TestResult {
        let zero_value = coupon_policy(DiscountKind::Fixed, Decimal::ZERO)?;

        let mut zero_limit = coupon_policy(DiscountKind::Fixed, dec!(1))?;
        zero_limit.usage_limit = Some(0);

        assert!(validate_coupon(&new_coupon(zero_value)).is_err());
        assert!(validate_coupon(&new_coupon(zero_limit)).is_err());

        Ok(())
    }

    #[tokio::test]
    async fn create_coupon_round_trips_policy() -> TestResult {
        let ctx = TestContext::new().await;
        let product = Uuid::now_v7();

        let mut policy = coupon_policy(DiscountKind::Percentage, dec!(15))?;
        policy.target = CouponTarget::Product(product);
        policy.max_discount_value = Some(dec!(40));
        policy.usage_per_user = Some(2);

        let created = ctx.coupons.create_coupon(new_coupon(policy.clone())).await?;
        let fetched = ctx.coupons.get_coupon_by_code("SPRING10").await?;

        assert_eq!(fetched.uuid, created.uuid);
        assert_eq!(fetched.policy.target, CouponTarget::Product(product));
        assert_eq!(fetched.policy.max_discount_value, Some(dec!(40)));
        assert_eq!(fetched.policy.usage_per_user, Some(2));
        assert_eq!(fetched.policy.kind, DiscountKind::Percentage);

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_code_returns_already_exists() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.coupons
            .create_coupon(new_coupon(coupon_policy(DiscountKind::Fixed, dec!(5))?))
            .await?;

        let result = ctx
            .coupons
            .create_coupon(new_coupon(coupon_policy(DiscountKind::Fixed, dec!(7))?))
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn claim_of_unknown_coupon_is_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;

        let result = ctx
            .coupons
            .claim_coupon(CouponUuid::new(), user.uuid, TargetContext::default())
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::CouponNotFound)),
            "expected CouponNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn offer_rules_run_before_the_user_lookup() -> TestResult {
        let ctx = TestContext::new().await;

        let mut policy = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        policy.is_active = false;

        let coupon = ctx.create_coupon("OFF", policy).await;

        let result = ctx
            .coupons
            .claim_coupon(coupon.uuid, UserUuid::new(), TargetContext::default())
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::Denied(DenyReason::Inactive))),
            "expected Inactive, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_is_reported_after_offer_rules_pass() -> TestResult {
        let ctx = TestContext::new().await;
        let coupon = ctx
            .create_coupon("OPEN", coupon_policy(DiscountKind::Fixed, dec!(5))?)
            .await;

        let result = ctx
            .coupons
            .claim_coupon(coupon.uuid, UserUuid::new(), TargetContext::default())
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::UserNotFound)),
            "expected UserNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn per_user_limit_counts_existing_claims() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;

        let mut policy = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        policy.usage_per_user = Some(2);

        let coupon = ctx.create_coupon("TWICE", policy).await;

        for _ in 0..2 {
            ctx.coupons
                .claim_coupon(coupon.uuid, user.uuid, TargetContext::default())
                .await?;
        }

        let third = ctx
            .coupons
            .claim_coupon(coupon.uuid, user.uuid, TargetContext::default())
            .await;

        assert!(
            matches!(
                third,
                Err(CouponsServiceError::Denied(DenyReason::PerUserLimitReached {
                    used: 2,
                    limit: 2
                }))
            ),
            "expected PerUserLimitReached, got {third:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn new_user_coupon_is_denied_after_any_other_claim() -> TestResult {
        let ctx = TestContext::new().await;
        let user = ctx.create_user(Role::Customer, "a@example.com").await;

        let first = ctx
            .create_coupon("FIRST", coupon_policy(DiscountKind::Fixed, dec!(5))?)
            .await;

        let mut welcome = coupon_policy(DiscountKind::Percentage, dec!(10))?;
        welcome.is_user_new = true;

        let welcome = ctx.create_coupon("WELCOME", welcome).await;

        ctx.coupons
            .claim_coupon(first.uuid, user.uuid, TargetContext::default())
            .await?;

        let result = ctx
            .coupons
            .claim_coupon(welcome.uuid, user.uuid, TargetContext::default())
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::Denied(DenyReason::NotNewUser))),
            "expected NotNewUser, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_claims_never_exceed_the_usage_limit() -> TestResult {
        let ctx = TestContext::new().await;
        let first = ctx.create_user(Role::Customer, "first@example.com").await;
        let second = ctx.create_user(Role::Customer, "second@example.com").await;

        let mut policy = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        policy.usage_limit = Some(1);

        let coupon = ctx.create_coupon("ONLYONE", policy).await;

        let (a, b) = tokio::join!(
            ctx.coupons
                .claim_coupon(coupon.uuid, first.uuid, TargetContext::default()),
            ctx.coupons
                .claim_coupon(coupon.uuid, second.uuid, TargetContext::default()),
        );

        let granted = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
        let denied = [a, b]
            .into_iter()
            .filter(|result| {
                matches!(
                    result,
                    Err(CouponsServiceError::Denied(
                        DenyReason::UsageLimitReached { .. }
                    ))
                )
            })
            .count();

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupon_users WHERE coupon_uuid = $1")
                .bind(coupon.uuid.into_uuid())
                .fetch_one(ctx.db.pool())
                .await?;

        assert_eq!(granted, 1);
        assert_eq!(denied, 1);
        assert_eq!(rows, 1);

        Ok(())
    }

    #[tokio::test]
    async fn available_coupons_follow_role_and_window() -> TestResult {
        let ctx = TestContext::new().await;
        let retailer = ctx.create_user(Role::Retailer, "shop@example.com").await;

        let mut for_customers = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        for_customers.target_role = TargetRole::Customer;

        let mut for_retailers = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        for_retailers.target_role = TargetRole::Retailer;

        let mut expired = coupon_policy(DiscountKind::Fixed, dec!(5))?;
        expired.valid_from = Timestamp::now().checked_sub(48.hours())?;
        expired.valid_to = Timestamp::now().checked_sub(24.hours())?;

        ctx.create_coupon("CUSTOMERS", for_customers).await;
        ctx.create_coupon("RETAIL", for_retailers).await;
        ctx.create_coupon("GONE", expired).await;
        ctx.create_coupon("EVERYONE", coupon_policy(DiscountKind::Fixed, dec!(1))?)
            .await;

        let codes: Vec<String> = ctx
            .coupons
            .available_coupons(retailer.uuid)
            .await?
            .into_iter()
            .map(|coupon| coupon.code)
            .collect();

        assert_eq!(codes, vec!["EVERYONE".to_string(), "RETAIL".to_string()]);

        Ok(())
    }
}
