//! Cartwright
//!
//! Cart line pricing and coupon rules for a storefront. Everything in this crate
//! is pure: callers load catalog and coupon data, hand it over, and persist what
//! comes back.

pub mod basis;
pub mod coupons;
pub mod eligibility;
pub mod lines;
pub mod resolver;
pub mod totals;
