//! Cartwright Domain Concerns

pub mod carts;
pub mod catalog;
pub(crate) mod columns;
pub mod coupons;
pub mod users;
