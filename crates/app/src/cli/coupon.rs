use std::io::Write;

use cartwright::coupons::TargetContext;
use cartwright_app::domain::{coupons::CouponsService, users::records::UserUuid};
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::write_failed;

#[derive(Debug, Args)]
pub(crate) struct CouponCommand {
    #[command(subcommand)]
    command: CouponSubcommand,
}

#[derive(Debug, Subcommand)]
enum CouponSubcommand {
    /// Claim a coupon for a user
    Claim(ClaimArgs),

    /// List coupons a user could apply right now
    Available(AvailableArgs),
}

#[derive(Debug, Args)]
struct ClaimArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Coupon code
    #[arg(long)]
    code: String,

    /// Product the coupon is claimed against
    #[arg(long)]
    product: Option<Uuid>,

    /// Product variant the coupon is claimed against
    #[arg(long)]
    variant: Option<Uuid>,

    /// Category the coupon is claimed against
    #[arg(long)]
    category: Option<Uuid>,

    /// Brand the coupon is claimed against
    #[arg(long)]
    brand: Option<Uuid>,
}

#[derive(Debug, Args)]
struct AvailableArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,
}

pub(crate) async fn run(
    command: CouponCommand,
    coupons: &dyn CouponsService,
    out: &mut impl Write,
) -> Result<(), String> {
    match command.command {
        CouponSubcommand::Claim(args) => {
            let coupon = coupons
                .get_coupon_by_code(&args.code)
                .await
                .map_err(|error| format!("failed to find coupon {}: {error}", args.code))?;

            let target = TargetContext {
                product: args.product,
                product_variant: args.variant,
                category: args.category,
                brand: args.brand,
            };

            let claim = coupons
                .claim_coupon(coupon.uuid, UserUuid::from_uuid(args.user), target)
                .await
                .map_err(|error| format!("cannot claim {}: {error}", args.code))?;

            writeln!(out, "claim_uuid: {}", claim.uuid).map_err(write_failed)?;
            writeln!(out, "coupon: {}", coupon.code).map_err(write_failed)
        }
        CouponSubcommand::Available(args) => {
            let available = coupons
                .available_coupons(UserUuid::from_uuid(args.user))
                .await
                .map_err(|error| format!("failed to list coupons: {error}"))?;

            if available.is_empty() {
                return writeln!(out, "no coupons available").map_err(write_failed);
            }

            for coupon in available {
                let policy = &coupon.policy;

                writeln!(
                    out,
                    "{}  {} {}  scope {}  until {}",
                    coupon.code,
                    policy.kind.as_str(),
                    policy.value,
                    policy.target.type_as_str(),
                    policy.valid_to
                )
                .map_err(write_failed)?;
            }

            Ok(())
        }
    }
}
