//! Pricing Config

use cartwright_app::domain::carts::data::CartSettings;
use clap::Args;
use rust_decimal::Decimal;

/// Cart pricing settings.
#[derive(Debug, Args)]
pub(crate) struct PricingConfig {
    /// Tax percentage applied to the cart subtotal
    #[arg(long, env = "CART_TAX_RATE", default_value = "0")]
    pub tax_rate: Decimal,

    /// Attempts per cart line re-price before a conflict is reported
    #[arg(
        long,
        env = "CART_REPRICE_ATTEMPTS",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub reprice_attempts: u32,
}

impl PricingConfig {
    pub(crate) fn settings(&self) -> CartSettings {
        CartSettings {
            tax_rate: self.tax_rate,
            reprice_attempts: self.reprice_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rust_decimal_macros::dec;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        pricing: PricingConfig,
    }

    #[test]
    fn flags_become_cart_settings() -> testresult::TestResult {
        let harness = Harness::try_parse_from([
            "cartwright",
            "--tax-rate",
            "7.5",
            "--reprice-attempts",
            "3",
        ])?;

        let settings = harness.pricing.settings();

        assert_eq!(settings.tax_rate, dec!(7.5));
        assert_eq!(settings.reprice_attempts, 3);

        Ok(())
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let result = Harness::try_parse_from(["cartwright", "--reprice-attempts", "0"]);

        assert!(result.is_err());
    }
}
