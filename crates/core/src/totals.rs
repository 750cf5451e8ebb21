//! Cart Totals
//!
//! Order-level figures projected from persisted line prices. Nothing here
//! recomputes a line; the stored `final_price` is the source of truth.

use rust_decimal::Decimal;

use crate::lines::round_currency;

/// The persisted figures of one line that feed the cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsLine {
    /// Persisted final price.
    pub final_price: Decimal,

    /// Persisted discount.
    pub discount_applied: Decimal,

    /// Lines for inactive or out-of-stock products are shown but not charged.
    pub is_purchasable: bool,
}

/// Order-level totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartTotals {
    /// Sum of purchasable line final prices.
    pub subtotal: Decimal,

    /// Sum of purchasable line discounts.
    pub discount_total: Decimal,

    /// `subtotal × tax_rate / 100`.
    pub tax: Decimal,

    /// `subtotal + tax`.
    pub total: Decimal,
}

impl CartTotals {
    /// Sum `lines`, taxing the subtotal at `tax_rate` percent.
    pub fn from_lines<'a, I>(lines: I, tax_rate: Decimal) -> Self
    where
        I: IntoIterator<Item = &'a TotalsLine>,
    {
        let (subtotal, discount_total) = lines
            .into_iter()
            .filter(|line| line.is_purchasable)
            .fold((Decimal::ZERO, Decimal::ZERO), |(subtotal, discount), line| {
                (subtotal + line.final_price, discount + line.discount_applied)
            });

        let tax = round_currency(subtotal * tax_rate / Decimal::ONE_HUNDRED);

        Self {
            subtotal,
            discount_total,
            tax,
            total: subtotal + tax,
        }
    }
}
