//! Shared fixtures for service tests.

pub mod helpers;

pub use context::TestContext;
