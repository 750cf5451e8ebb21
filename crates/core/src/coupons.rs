//! Coupons
//!
//! Coupon shapes, scopes and the audience a coupon is offered to.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Error parsing one of the coupon enums from its stored form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseCouponFieldError {
    kind: &'static str,
    value: String,
}

impl ParseCouponFieldError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Shape of a discount: a flat amount or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountKind {
    /// Flat currency amount.
    Fixed,

    /// Percentage of the unit price.
    Percentage,
}

impl DiscountKind {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percentage => "percentage",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = ParseCouponFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fixed" => Ok(Self::Fixed),
            "percentage" => Ok(Self::Percentage),
            other => Err(ParseCouponFieldError::new("discount kind", other)),
        }
    }
}

/// Caller role, as supplied by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Regular shopper.
    Customer,

    /// Approved retailer buying in volume.
    Retailer,

    /// Back-office administrator.
    Admin,
}

impl Role {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Retailer => "retailer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseCouponFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customer" => Ok(Self::Customer),
            "retailer" => Ok(Self::Retailer),
            "admin" => Ok(Self::Admin),
            other => Err(ParseCouponFieldError::new("role", other)),
        }
    }
}

/// Which roles a coupon is offered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    /// Customers only.
    Customer,

    /// Retailers only.
    Retailer,

    /// Everyone.
    Both,
}

impl TargetRole {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Retailer => "retailer",
            Self::Both => "both",
        }
    }

    /// Whether a caller with `role` is in the audience.
    pub const fn admits(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Self::Both, _) | (Self::Customer, Role::Customer) | (Self::Retailer, Role::Retailer)
        )
    }
}

impl FromStr for TargetRole {
    type Err = ParseCouponFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customer" => Ok(Self::Customer),
            "retailer" => Ok(Self::Retailer),
            "both" => Ok(Self::Both),
            other => Err(ParseCouponFieldError::new("target role", other)),
        }
    }
}

/// What a coupon applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CouponTarget {
    /// Any line in the cart.
    Cart,

    /// Lines of one product.
    Product(Uuid),

    /// Lines whose product is in one category.
    Category(Uuid),

    /// Lines whose product belongs to one brand.
    Brand(Uuid),

    /// Lines of one product variant.
    ProductVariant(Uuid),
}

impl CouponTarget {
    /// Stored `target_type` value.
    pub const fn type_as_str(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Product(_) => "product",
            Self::Category(_) => "category",
            Self::Brand(_) => "brand",
            Self::ProductVariant(_) => "product_variant",
        }
    }

    /// The target id, absent for cart-wide coupons.
    pub const fn target_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Cart => None,
            Self::Product(uuid)
            | Self::Category(uuid)
            | Self::Brand(uuid)
            | Self::ProductVariant(uuid) => Some(*uuid),
        }
    }

    /// Rebuild a target from its stored type and id.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown type, or a scoped type without an id.
    pub fn from_parts(target_type: &str, uuid: Option<Uuid>) -> Result<Self, ParseCouponFieldError> {
        let scoped = |wrap: fn(Uuid) -> Self| {
            uuid.map(wrap)
                .ok_or_else(|| ParseCouponFieldError::new("target id", target_type))
        };

        match target_type {
            "cart" => Ok(Self::Cart),
            "product" => scoped(Self::Product),
            "category" => scoped(Self::Category),
            "brand" => scoped(Self::Brand),
            "product_variant" => scoped(Self::ProductVariant),
            other => Err(ParseCouponFieldError::new("target type", other)),
        }
    }

    /// Whether the target covers the given context.
    pub fn covers(&self, context: &TargetContext) -> bool {
        match self {
            Self::Cart => true,
            Self::Product(uuid) => context.product == Some(*uuid),
            Self::Category(uuid) => context.category == Some(*uuid),
            Self::Brand(uuid) => context.brand == Some(*uuid),
            Self::ProductVariant(uuid) => context.product_variant == Some(*uuid),
        }
    }
}

/// The catalog ids a coupon is being used against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetContext {
    /// Product id.
    pub product: Option<Uuid>,

    /// Product variant id.
    pub product_variant: Option<Uuid>,

    /// Category id.
    pub category: Option<Uuid>,

    /// Brand id.
    pub brand: Option<Uuid>,
}

/// What the resolver needs to know about an attached coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponTerms {
    /// Discount shape.
    pub kind: DiscountKind,

    /// Flat amount or percentage, depending on `kind`.
    pub value: Decimal,

    /// Cap on the line discount of a percentage coupon.
    pub max_discount_value: Option<Decimal>,

    /// Minimum line value before the coupon contributes.
    pub min_cart_value: Option<Decimal>,

    /// Inactive coupons contribute nothing.
    pub is_active: bool,
}

/// A coupon's full rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponPolicy {
    /// Discount shape.
    pub kind: DiscountKind,

    /// Flat amount or percentage, depending on `kind`.
    pub value: Decimal,

    /// Scope.
    pub target: CouponTarget,

    /// Audience.
    pub target_role: TargetRole,

    /// Minimum line value before the coupon contributes.
    pub min_cart_value: Option<Decimal>,

    /// Cap on the line discount of a percentage coupon.
    pub max_discount_value: Option<Decimal>,

    /// Total claims allowed across all users.
    pub usage_limit: Option<u32>,

    /// Claims allowed per user.
    pub usage_per_user: Option<u32>,

    /// Start of the validity window, inclusive.
    pub valid_from: Timestamp,

    /// End of the validity window, inclusive.
    pub valid_to: Timestamp,

    /// Admin switch.
    pub is_active: bool,

    /// Only users who have never claimed any coupon may claim this one.
    pub is_user_new: bool,
}

impl CouponPolicy {
    /// Terms handed to the resolver.
    pub const fn terms(&self) -> CouponTerms {
        CouponTerms {
            kind: self.kind,
            value: self.value,
            max_discount_value: self.max_discount_value,
            min_cart_value: self.min_cart_value,
            is_active: self.is_active,
        }
    }

    /// Whether `at` falls inside the validity window.
    pub fn is_within_window(&self, at: Timestamp) -> bool {
        self.valid_from <= at && at <= self.valid_to
    }

    /// Active and inside the validity window.
    pub fn is_live_at(&self, at: Timestamp) -> bool {
        self.is_active && self.is_within_window(at)
    }

    /// Advisory check used when listing coupons a user could apply.
    pub fn is_available_to(&self, role: Role, at: Timestamp) -> bool {
        self.is_live_at(at) && self.target_role.admits(role)
    }
}
