//! CLI configuration

pub(crate) mod db;
pub(crate) mod logging;
pub(crate) mod pricing;
