//! Line Pricing
//!
//! Turns a [`Resolution`] into the economics stored on a cart item.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    basis::PriceBasis,
    coupons::{CouponTerms, DiscountKind},
    resolver::{DiscountSource, Resolution, resolve},
};

/// Decimal places kept on persisted currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Round a currency amount to [`CURRENCY_SCALE`] places, halves away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// The persisted economics of one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    /// Units on the line.
    pub total_quantity: u32,

    /// Unit price captured at pricing time.
    pub price_at_time: Decimal,

    /// Threshold of the quantity tier that fired.
    pub discount_quantity: Option<u32>,

    /// Total saved across the line. Never more than the line's gross value.
    pub discount_applied: Decimal,

    /// Shape of the applied discount.
    pub discount_type: Option<DiscountKind>,

    /// Origin of the applied discount.
    pub discount_source: Option<DiscountSource>,

    /// `price_at_time × total_quantity − discount_applied`.
    pub final_price: Decimal,
}

impl PricedLine {
    /// Undiscounted line value.
    pub fn gross(&self) -> Decimal {
        self.price_at_time
            .saturating_mul(Decimal::from(self.total_quantity))
    }
}

/// Price `quantity` units against `basis`, with an optional attached coupon.
///
/// This is the only place a line's discount and final price are derived.
pub fn price_line(basis: &PriceBasis, quantity: u32, coupon: Option<&CouponTerms>) -> PricedLine {
    let resolution = resolve(basis, quantity, coupon);

    priced_from(basis, quantity, &resolution)
}

fn priced_from(basis: &PriceBasis, quantity: u32, resolution: &Resolution) -> PricedLine {
    let price_at_time = round_currency(basis.unit_price);
    // Saturates; `resolve` leaves a line this large undiscounted.
    let gross = price_at_time.saturating_mul(Decimal::from(quantity));

    let discount_applied = round_currency(resolution.line_discount(quantity))
        .min(gross.max(Decimal::ZERO))
        .max(Decimal::ZERO);

    let discount_quantity = match resolution.discount_source {
        Some(DiscountSource::Quantity) => resolution.tier_threshold,
        Some(DiscountSource::Coupon) | None => None,
    };

    PricedLine {
        total_quantity: quantity,
        price_at_time,
        discount_quantity,
        discount_applied,
        discount_type: resolution.discount_type,
        discount_source: resolution.discount_source,
        final_price: (gross - discount_applied).max(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(1.004)), dec!(1.00));
        assert_eq!(round_currency(dec!(33.333333)), dec!(33.33));
    }

    #[test]
    fn fixed_coupon_larger_than_line_saves_at_most_the_line() {
        let coupon = CouponTerms {
            kind: DiscountKind::Fixed,
            value: dec!(500),
            max_discount_value: None,
            min_cart_value: None,
            is_active: true,
        };

        let line = price_line(&PriceBasis::new(dec!(100)), 2, Some(&coupon));

        assert_eq!(line.discount_applied, dec!(200));
        assert_eq!(line.final_price, dec!(0));
        assert_eq!(line.discount_type, Some(DiscountKind::Fixed));
        assert_eq!(line.discount_quantity, None);
    }

    #[test]
    fn fractional_percentages_round_the_line_total() {
        let coupon = CouponTerms {
            kind: DiscountKind::Percentage,
            value: dec!(12.5),
            max_discount_value: None,
            min_cart_value: None,
            is_active: true,
        };

        // 9.99 × 12.5% = 1.24875/unit, × 3 = 3.74625 → 3.75
        let line = price_line(&PriceBasis::new(dec!(9.99)), 3, Some(&coupon));

        assert_eq!(line.discount_applied, dec!(3.75));
        assert_eq!(line.final_price, dec!(26.22));
        assert_eq!(line.final_price + line.discount_applied, line.gross());
    }

    #[test]
    fn capped_coupon_rounds_back_to_the_cap() {
        let coupon = CouponTerms {
            kind: DiscountKind::Percentage,
            value: dec!(50),
            max_discount_value: Some(dec!(100)),
            min_cart_value: None,
            is_active: true,
        };

        let line = price_line(&PriceBasis::new(dec!(90)), 3, Some(&coupon));

        assert_eq!(line.discount_applied, dec!(100));
        assert_eq!(line.final_price, dec!(170));
    }

    #[test]
    fn degenerate_price_yields_zero_line() {
        let line = price_line(&PriceBasis::new(dec!(-5)), 2, None);

        assert_eq!(line.discount_applied, dec!(0));
        assert_eq!(line.final_price, dec!(0));
        assert_eq!(line.discount_type, None);
    }

    #[test]
    fn overflowing_line_saturates_without_a_discount() {
        let coupon = CouponTerms {
            kind: DiscountKind::Percentage,
            value: dec!(10),
            max_discount_value: None,
            min_cart_value: None,
            is_active: true,
        };

        let line = price_line(&PriceBasis::new(Decimal::MAX), u32::MAX, Some(&coupon));

        assert_eq!(line.discount_applied, dec!(0));
        assert_eq!(line.discount_source, None);
        assert_eq!(line.final_price, Decimal::MAX);
        assert_eq!(line.gross(), Decimal::MAX);
    }
}
