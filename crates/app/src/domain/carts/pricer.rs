//! Cart Line Pricer
//!
//! Pure pricing of a stored line against its current catalog rows and
//! attached coupon, plus the retry loop around versioned writes.

use std::future::Future;

use cartwright::{
    coupons::{CouponPolicy, CouponTerms},
    lines::{PricedLine, price_line},
};
use jiff::Timestamp;
use tracing::{debug, warn};

use crate::domain::{
    carts::{errors::CartsServiceError, records::CartItemRecord},
    catalog::records::LineCatalog,
};

/// Terms an attached coupon contributes to `line` at `now`.
///
/// A coupon that is switched off, outside its window, or scoped to other
/// catalog entries stays attached but contributes nothing.
pub(crate) fn coupon_terms(
    line: &LineCatalog,
    coupon: Option<&CouponPolicy>,
    now: Timestamp,
) -> Option<CouponTerms> {
    let coupon = coupon?;

    if !coupon.is_live_at(now) {
        debug!("attached coupon is not live; pricing without it");

        return None;
    }

    if !coupon.target.covers(&line.target_context()) {
        debug!(
            scope = coupon.target.type_as_str(),
            "attached coupon does not cover the line"
        );

        return None;
    }

    Some(coupon.terms())
}

/// Price `quantity` units of `line` with an optional attached coupon.
pub(crate) fn price_item(
    line: &LineCatalog,
    quantity: u32,
    coupon: Option<&CouponPolicy>,
    now: Timestamp,
) -> PricedLine {
    let basis = line.price_basis();

    if basis.is_degenerate() || quantity == 0 {
        debug!(
            product_uuid = %line.product.uuid,
            unit_price = %basis.unit_price,
            quantity,
            "degenerate price basis; no discount applies"
        );
    }

    let terms = coupon_terms(line, coupon, now);

    price_line(&basis, quantity, terms.as_ref())
}

/// Whether a stored line disagrees with a fresh derivation at `now`.
pub(crate) fn is_stale(
    item: &CartItemRecord,
    line: &LineCatalog,
    coupon: Option<&CouponPolicy>,
    now: Timestamp,
) -> bool {
    let derived = price_item(line, item.total_quantity, coupon, now);

    derived.price_at_time != item.price_at_time
        || derived.discount_applied != item.discount_applied
        || derived.final_price != item.final_price
}

/// Run a read-modify-write until it stops hitting version conflicts, at most
/// `attempts` times.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    attempts: u32,
    mut operation: F,
) -> Result<T, CartsServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CartsServiceError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Err(CartsServiceError::Conflict) if attempt < attempts => {
                warn!(attempt, attempts, "cart item changed underneath us; retrying");

                attempt += 1;
            }
            Err(CartsServiceError::Conflict) => {
                warn!(attempts, "cart item kept changing; giving up");

                return Err(CartsServiceError::Conflict);
            }
            result => return result,
        }
    }
}
