//! Discount Resolver
//!
//! Picks the single best discount for a line: its quantity tier or its coupon.
//! The resolver has no failure mode. Inputs that cannot be discounted resolve to
//! [`Resolution::NONE`].

use rust_decimal::Decimal;

use crate::{
    basis::PriceBasis,
    coupons::{CouponTerms, DiscountKind},
};

/// Where the winning discount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountSource {
    /// The attached coupon.
    Coupon,

    /// A quantity tier of the price basis.
    Quantity,
}

impl DiscountSource {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coupon => "coupon",
            Self::Quantity => "quantity",
        }
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Configured value of the winner: a percentage, or a flat amount.
    pub discount_value: Decimal,

    /// Shape of the winner.
    pub discount_type: Option<DiscountKind>,

    /// Origin of the winner.
    pub discount_source: Option<DiscountSource>,

    /// Per-unit amount for percentage discounts, flat line amount for fixed
    /// coupons.
    pub actual_discount_amount: Decimal,

    /// Threshold of the tier that fired, when the tier won.
    pub tier_threshold: Option<u32>,

    /// Cap on the scaled line amount of a percentage coupon.
    pub line_cap: Option<Decimal>,
}

impl Resolution {
    /// No discount applies.
    pub const NONE: Self = Self {
        discount_value: Decimal::ZERO,
        discount_type: None,
        discount_source: None,
        actual_discount_amount: Decimal::ZERO,
        tier_threshold: None,
        line_cap: None,
    };

    /// Whether any discount won.
    pub const fn is_none(&self) -> bool {
        self.discount_source.is_none()
    }

    /// Total amount saved across a line of `quantity` units.
    ///
    /// Percentage discounts scale with quantity; a fixed coupon discounts the
    /// line once.
    pub fn line_discount(&self, quantity: u32) -> Decimal {
        match self.discount_type {
            None => Decimal::ZERO,
            Some(DiscountKind::Fixed) => self.actual_discount_amount,
            Some(DiscountKind::Percentage) => {
                let scaled = self
                    .actual_discount_amount
                    .saturating_mul(Decimal::from(quantity));

                self.line_cap.map_or(scaled, |cap| scaled.min(cap))
            }
        }
    }
}

struct Candidate {
    resolution: Resolution,
}

impl Candidate {
    fn amount(&self) -> Decimal {
        self.resolution.actual_discount_amount
    }
}

/// Resolve the best discount for `quantity` units priced at `basis`.
///
/// The quantity tier is evaluated first and a coupon has to beat it strictly,
/// so equal amounts go to the tier. The coupon is assumed to have passed
/// eligibility; only its `is_active` flag and minimum value are checked here.
///
/// A line whose value does not fit in a [`Decimal`] is not discounted.
pub fn resolve(basis: &PriceBasis, quantity: u32, coupon: Option<&CouponTerms>) -> Resolution {
    if basis.is_degenerate() || quantity == 0 {
        return Resolution::NONE;
    }

    let Some(gross) = basis.unit_price.checked_mul(Decimal::from(quantity)) else {
        return Resolution::NONE;
    };

    let tier = quantity_candidate(basis, quantity);
    let coupon = coupon.and_then(|terms| coupon_candidate(basis, quantity, gross, terms));

    let winner = match (tier, coupon) {
        (Some(tier), Some(coupon)) if coupon.amount() > tier.amount() => Some(coupon),
        (Some(tier), _) => Some(tier),
        (None, coupon) => coupon,
    };

    winner
        .filter(|candidate| candidate.amount() > Decimal::ZERO)
        .map_or(Resolution::NONE, |candidate| candidate.resolution)
}

fn percent_of(amount: Decimal, percentage: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(percentage)?
        .checked_div(Decimal::ONE_HUNDRED)
}

fn quantity_candidate(basis: &PriceBasis, quantity: u32) -> Option<Candidate> {
    let tier = basis.active_tier(quantity)?;

    Some(Candidate {
        resolution: Resolution {
            discount_value: tier.percentage(),
            discount_type: Some(DiscountKind::Percentage),
            discount_source: Some(DiscountSource::Quantity),
            actual_discount_amount: percent_of(basis.unit_price, tier.percentage())?,
            tier_threshold: Some(tier.threshold()),
            line_cap: None,
        },
    })
}

fn coupon_candidate(
    basis: &PriceBasis,
    quantity: u32,
    gross: Decimal,
    terms: &CouponTerms,
) -> Option<Candidate> {
    if !terms.is_active || terms.value <= Decimal::ZERO {
        return None;
    }

    if let Some(minimum) = terms.min_cart_value
        && gross < minimum
    {
        return None;
    }

    let quantity = Decimal::from(quantity);

    let (amount, line_cap) = match terms.kind {
        DiscountKind::Fixed => (terms.value, None),
        DiscountKind::Percentage => {
            let per_unit = percent_of(basis.unit_price, terms.value.min(Decimal::ONE_HUNDRED))?;

            match terms.max_discount_value {
                Some(cap) => (per_unit.min(cap.checked_div(quantity)?), Some(cap)),
                None => (per_unit, None),
            }
        }
    };

    Some(Candidate {
        resolution: Resolution {
            discount_value: terms.value,
            discount_type: Some(terms.kind),
            discount_source: Some(DiscountSource::Coupon),
            actual_discount_amount: amount,
            tier_threshold: None,
            line_cap,
        },
    })
}
