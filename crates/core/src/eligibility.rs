//! Coupon Eligibility
//!
//! Claim rules, evaluated in a fixed order with the first failure winning:
//! scope, active flag, validity window, then (once the user is known) the
//! new-user rule, the per-user limit and the global limit.
//!
//! Existence of the coupon and the user is the caller's concern; both checks
//! need storage.

use std::fmt;

use jiff::Timestamp;

use crate::coupons::{CouponPolicy, CouponTarget, TargetContext};

/// Why a claim was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The coupon's target does not match the claim context.
    ScopeMismatch {
        /// The coupon's scope.
        target: CouponTarget,
    },

    /// The coupon is switched off.
    Inactive,

    /// The validity window has not opened.
    NotYetValid {
        /// Window start.
        valid_from: Timestamp,
    },

    /// The validity window has closed.
    Expired {
        /// Window end.
        valid_to: Timestamp,
    },

    /// New-user coupon, and the user has claimed a coupon before.
    NotNewUser,

    /// The user has used up their claims of this coupon.
    PerUserLimitReached {
        /// Claims made by the user.
        used: u64,
        /// Allowed claims per user.
        limit: u32,
    },

    /// The coupon has no claims left.
    UsageLimitReached {
        /// Claims made by everyone.
        used: u64,
        /// Allowed claims in total.
        limit: u32,
    },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeMismatch { target } => match target {
                CouponTarget::Cart => f.write_str("this coupon does not apply here"),
                CouponTarget::Product(_) => {
                    f.write_str("this coupon is only valid for a specific product")
                }
                CouponTarget::Category(_) => {
                    f.write_str("this coupon is only valid for a specific category")
                }
                CouponTarget::Brand(_) => f.write_str("this coupon is only valid for a specific brand"),
                CouponTarget::ProductVariant(_) => {
                    f.write_str("this coupon is only valid for a specific product variant")
                }
            },
            Self::Inactive => f.write_str("this coupon is not active"),
            Self::NotYetValid { valid_from } => {
                write!(f, "this coupon is not valid until {valid_from}")
            }
            Self::Expired { valid_to } => write!(f, "this coupon expired at {valid_to}"),
            Self::NotNewUser => f.write_str("this coupon is only available to new users"),
            Self::PerUserLimitReached { used, limit } => {
                write!(f, "you have already used this coupon ({used}/{limit})")
            }
            Self::UsageLimitReached { used, limit } => {
                write!(f, "this coupon has been fully claimed ({used}/{limit})")
            }
        }
    }
}

impl std::error::Error for DenyReason {}

/// Claim counts read from storage for one (user, coupon) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimUsage {
    /// Claims by the user across every coupon.
    pub user_claims_total: u64,

    /// Claims by the user of this coupon.
    pub user_claims_of_coupon: u64,

    /// Claims of this coupon by every user.
    pub coupon_claims_total: u64,
}

/// Scope, active flag and validity window.
///
/// # Errors
///
/// Returns the first rule that fails.
pub fn check_offer(
    coupon: &CouponPolicy,
    context: &TargetContext,
    now: Timestamp,
) -> Result<(), DenyReason> {
    if !coupon.target.covers(context) {
        return Err(DenyReason::ScopeMismatch {
            target: coupon.target,
        });
    }

    if !coupon.is_active {
        return Err(DenyReason::Inactive);
    }

    if now < coupon.valid_from {
        return Err(DenyReason::NotYetValid {
            valid_from: coupon.valid_from,
        });
    }

    if now > coupon.valid_to {
        return Err(DenyReason::Expired {
            valid_to: coupon.valid_to,
        });
    }

    Ok(())
}

/// New-user rule, per-user limit and global limit.
///
/// # Errors
///
/// Returns the first rule that fails.
pub fn check_usage(coupon: &CouponPolicy, usage: &ClaimUsage) -> Result<(), DenyReason> {
    if coupon.is_user_new && usage.user_claims_total > 0 {
        return Err(DenyReason::NotNewUser);
    }

    if let Some(limit) = coupon.usage_per_user
        && usage.user_claims_of_coupon >= u64::from(limit)
    {
        return Err(DenyReason::PerUserLimitReached {
            used: usage.user_claims_of_coupon,
            limit,
        });
    }

    if let Some(limit) = coupon.usage_limit
        && usage.coupon_claims_total >= u64::from(limit)
    {
        return Err(DenyReason::UsageLimitReached {
            used: usage.coupon_claims_total,
            limit,
        });
    }

    Ok(())
}

/// Every rule, for callers that already hold the coupon, user facts and counts.
///
/// # Errors
///
/// Returns the first rule that fails.
pub fn can_claim(
    coupon: &CouponPolicy,
    context: &TargetContext,
    now: Timestamp,
    usage: &ClaimUsage,
) -> Result<(), DenyReason> {
    check_offer(coupon, context, now)?;
    check_usage(coupon, usage)
}
