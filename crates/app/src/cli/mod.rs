use std::io;

use cartwright_app::context::{AppContext, AppInitError};
use clap::{Parser, Subcommand};

use crate::config::{db::DatabaseConfig, logging::LoggingConfig, pricing::PricingConfig};

mod cart;
mod coupon;
mod db;

#[derive(Debug, Parser)]
#[command(name = "cartwright", about = "Cart pricing and coupon CLI", long_about = None)]
pub(crate) struct Cli {
    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Cart pricing settings.
    #[command(flatten)]
    pub pricing: PricingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Cart(cart::CartCommand),
    Coupon(coupon::CouponCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Db(command) => db::run(command, &self.database).await,
            Commands::Cart(command) => {
                let context = connect(&self.database, &self.pricing).await?;

                cart::run(
                    command,
                    &*context.carts,
                    &*context.coupons,
                    &mut io::stdout().lock(),
                )
                .await
            }
            Commands::Coupon(command) => {
                let context = connect(&self.database, &self.pricing).await?;

                coupon::run(command, &*context.coupons, &mut io::stdout().lock()).await
            }
        }
    }
}

async fn connect(database: &DatabaseConfig, pricing: &PricingConfig) -> Result<AppContext, String> {
    AppContext::from_database_url(&database.database_url, pricing.settings())
        .await
        .map_err(|AppInitError::Database(error)| format!("failed to connect to database: {error}"))
}

pub(crate) fn write_failed(error: io::Error) -> String {
    format!("failed to write output: {error}")
}
