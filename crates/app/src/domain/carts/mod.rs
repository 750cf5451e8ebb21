//! Carts

pub mod data;
mod errors;
pub(crate) mod pricer;
pub mod records;
mod repositories;
pub(crate) mod repricer;
pub mod service;
pub mod views;

pub use errors::CartsServiceError;
pub use service::*;
