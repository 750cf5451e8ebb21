//! Coupons Repository

use cartwright::{
    coupons::{CouponPolicy, CouponTarget},
    eligibility::ClaimUsage,
};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    columns::{try_get_optional_count, try_get_parsed, try_get_total, try_optional_i32_from_u32},
    coupons::{
        data::NewCoupon,
        records::{CouponClaimRecord, CouponClaimUuid, CouponRecord, CouponUuid},
    },
    users::records::UserUuid,
};

const CREATE_COUPON_SQL: &str = include_str!("sql/create_coupon.sql");
const GET_COUPON_SQL: &str = include_str!("sql/get_coupon.sql");
const GET_COUPON_BY_CODE_SQL: &str = include_str!("sql/get_coupon_by_code.sql");
const LOCK_COUPON_SQL: &str = include_str!("sql/lock_coupon.sql");
const LIST_LIVE_COUPONS_SQL: &str = include_str!("sql/list_live_coupons.sql");
const SET_COUPON_ACTIVE_SQL: &str = include_str!("sql/set_coupon_active.sql");
const CLAIM_USAGE_SQL: &str = include_str!("sql/claim_usage.sql");
const CREATE_CLAIM_SQL: &str = include_str!("sql/create_claim.sql");
const HAS_CLAIM_SQL: &str = include_str!("sql/has_claim.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: NewCoupon,
    ) -> Result<CouponRecord, sqlx::Error> {
        let policy = coupon.policy;

        query_as::<Postgres, CouponRecord>(CREATE_COUPON_SQL)
            .bind(coupon.uuid.into_uuid())
            .bind(coupon.code)
            .bind(policy.kind.as_str())
            .bind(policy.value)
            .bind(policy.target.type_as_str())
            .bind(policy.target.target_uuid())
            .bind(policy.target_role.as_str())
            .bind(policy.min_cart_value)
            .bind(policy.max_discount_value)
            .bind(try_optional_i32_from_u32(policy.usage_limit, "usage_limit")?)
            .bind(try_optional_i32_from_u32(
                policy.usage_per_user,
                "usage_per_user",
            )?)
            .bind(SqlxTimestamp::from(policy.valid_from))
            .bind(SqlxTimestamp::from(policy.valid_to))
            .bind(policy.is_active)
            .bind(policy.is_user_new)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(GET_COUPON_SQL)
            .bind(coupon.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn find_coupon_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(GET_COUPON_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Fetch a coupon and hold its row lock until the transaction ends.
    ///
    /// Every claim of a coupon takes this lock first, so claims of the same
    /// coupon run one at a time.
    pub(crate) async fn lock_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(LOCK_COUPON_SQL)
            .bind(coupon.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Active coupons whose window contains `at`.
    pub(crate) async fn list_live_coupons(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        at: Timestamp,
    ) -> Result<Vec<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(LIST_LIVE_COUPONS_SQL)
            .bind(SqlxTimestamp::from(at))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn set_coupon_active(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        is_active: bool,
    ) -> Result<CouponRecord, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(SET_COUPON_ACTIVE_SQL)
            .bind(coupon.into_uuid())
            .bind(is_active)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn claim_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        user: UserUuid,
    ) -> Result<ClaimUsage, sqlx::Error> {
        let row = query(CLAIM_USAGE_SQL)
            .bind(coupon.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        Ok(ClaimUsage {
            user_claims_total: try_get_total(&row, "user_claims_total")?,
            user_claims_of_coupon: try_get_total(&row, "user_claims_of_coupon")?,
            coupon_claims_total: try_get_total(&row, "coupon_claims_total")?,
        })
    }

    pub(crate) async fn create_claim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        user: UserUuid,
    ) -> Result<CouponClaimRecord, sqlx::Error> {
        query_as::<Postgres, CouponClaimRecord>(CREATE_CLAIM_SQL)
            .bind(CouponClaimUuid::new().into_uuid())
            .bind(coupon.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn has_claim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        user: UserUuid,
    ) -> Result<bool, sqlx::Error> {
        let row = query(HAS_CLAIM_SQL)
            .bind(coupon.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        row.try_get("claimed")
    }
}

fn try_get_target(row: &PgRow) -> Result<CouponTarget, sqlx::Error> {
    let target_type: String = row.try_get("target_type")?;
    let target_uuid: Option<Uuid> = row.try_get("target_uuid")?;

    CouponTarget::from_parts(&target_type, target_uuid).map_err(|e| sqlx::Error::ColumnDecode {
        index: "target_type".to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for CouponRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CouponUuid::from_uuid(row.try_get("uuid")?),
            code: row.try_get("code")?,
            policy: CouponPolicy {
                kind: try_get_parsed(row, "kind")?,
                value: row.try_get("discount_value")?,
                target: try_get_target(row)?,
                target_role: try_get_parsed(row, "target_role")?,
                min_cart_value: row.try_get("min_cart_value")?,
                max_discount_value: row.try_get("max_discount_value")?,
                usage_limit: try_get_optional_count(row, "usage_limit")?,
                usage_per_user: try_get_optional_count(row, "usage_per_user")?,
                valid_from: row.try_get::<SqlxTimestamp, _>("valid_from")?.to_jiff(),
                valid_to: row.try_get::<SqlxTimestamp, _>("valid_to")?.to_jiff(),
                is_active: row.try_get("is_active")?,
                is_user_new: row.try_get("is_user_new")?,
            },
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CouponClaimRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CouponClaimUuid::from_uuid(row.try_get("uuid")?),
            coupon_uuid: CouponUuid::from_uuid(row.try_get("coupon_uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
