use std::io::Write;

use cartwright_app::domain::{
    carts::{
        CartsService,
        data::NewCartItem,
        records::{CartItemRecord, CartItemUuid},
        views::CartView,
    },
    catalog::records::{ProductUuid, VariantUuid},
    coupons::CouponsService,
    users::records::UserUuid,
};
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::write_failed;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Show a user's cart with totals
    Show(ShowArgs),

    /// Add a product or variant to a user's cart
    Add(AddArgs),

    /// Set the quantity of a cart line
    Quantity(QuantityArgs),

    /// Remove a cart line
    Remove(ItemArgs),

    /// Attach or detach a coupon
    Coupon(CouponCommand),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Print the cart as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Product UUID
    #[arg(long)]
    product: Uuid,

    /// Optional variant UUID
    #[arg(long)]
    variant: Option<Uuid>,

    /// Units to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

#[derive(Debug, Args)]
struct QuantityArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Cart item UUID
    #[arg(long)]
    item: Uuid,

    /// New quantity
    #[arg(long)]
    quantity: u32,
}

#[derive(Debug, Args)]
struct ItemArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Cart item UUID
    #[arg(long)]
    item: Uuid,
}

#[derive(Debug, Args)]
struct CouponCommand {
    #[command(subcommand)]
    command: CouponSubcommand,
}

#[derive(Debug, Subcommand)]
enum CouponSubcommand {
    /// Attach a claimed coupon to a cart line
    Attach(AttachArgs),

    /// Detach the coupon from a cart line
    Detach(ItemArgs),
}

#[derive(Debug, Args)]
struct AttachArgs {
    #[command(flatten)]
    line: ItemArgs,

    /// Coupon code
    #[arg(long)]
    code: String,
}

pub(crate) async fn run(
    command: CartCommand,
    carts: &dyn CartsService,
    coupons: &dyn CouponsService,
    out: &mut impl Write,
) -> Result<(), String> {
    match command.command {
        CartSubcommand::Show(args) => {
            let cart = carts
                .get_cart(UserUuid::from_uuid(args.user))
                .await
                .map_err(|error| format!("failed to load cart: {error}"))?;

            if args.json {
                serde_json::to_writer_pretty(&mut *out, &cart)
                    .map_err(|error| format!("failed to encode cart: {error}"))?;

                writeln!(out).map_err(write_failed)
            } else {
                write_cart(out, &cart).map_err(write_failed)
            }
        }
        CartSubcommand::Add(args) => {
            let item = carts
                .add_item(
                    UserUuid::from_uuid(args.user),
                    NewCartItem {
                        uuid: CartItemUuid::new(),
                        product_uuid: ProductUuid::from_uuid(args.product),
                        product_variant_uuid: args.variant.map(VariantUuid::from_uuid),
                        quantity: args.quantity,
                    },
                )
                .await
                .map_err(|error| format!("failed to add item: {error}"))?;

            write_item(out, &item).map_err(write_failed)
        }
        CartSubcommand::Quantity(args) => {
            let item = carts
                .update_quantity(
                    UserUuid::from_uuid(args.user),
                    CartItemUuid::from_uuid(args.item),
                    args.quantity,
                )
                .await
                .map_err(|error| format!("failed to update quantity: {error}"))?;

            write_item(out, &item).map_err(write_failed)
        }
        CartSubcommand::Remove(args) => {
            carts
                .remove_item(
                    UserUuid::from_uuid(args.user),
                    CartItemUuid::from_uuid(args.item),
                )
                .await
                .map_err(|error| format!("failed to remove item: {error}"))?;

            writeln!(out, "removed {}", args.item).map_err(write_failed)
        }
        CartSubcommand::Coupon(CouponCommand {
            command: CouponSubcommand::Attach(args),
        }) => {
            let coupon = coupons
                .get_coupon_by_code(&args.code)
                .await
                .map_err(|error| format!("failed to find coupon {}: {error}", args.code))?;

            let item = carts
                .attach_coupon(
                    UserUuid::from_uuid(args.line.user),
                    CartItemUuid::from_uuid(args.line.item),
                    coupon.uuid,
                )
                .await
                .map_err(|error| format!("failed to attach coupon: {error}"))?;

            write_item(out, &item).map_err(write_failed)
        }
        CartSubcommand::Coupon(CouponCommand {
            command: CouponSubcommand::Detach(args),
        }) => {
            let item = carts
                .detach_coupon(
                    UserUuid::from_uuid(args.user),
                    CartItemUuid::from_uuid(args.item),
                )
                .await
                .map_err(|error| format!("failed to detach coupon: {error}"))?;

            write_item(out, &item).map_err(write_failed)
        }
    }
}

fn write_item(out: &mut impl Write, item: &CartItemRecord) -> std::io::Result<()> {
    writeln!(out, "item_uuid: {}", item.uuid)?;
    writeln!(out, "quantity: {}", item.total_quantity)?;
    writeln!(out, "unit_price: {}", item.price_at_time)?;
    writeln!(out, "discount: {}", item.discount_applied)?;
    writeln!(out, "final_price: {}", item.final_price)?;

    if let Some(coupon) = item.coupon_uuid {
        writeln!(out, "coupon_uuid: {coupon}")?;
    }

    Ok(())
}

fn write_cart(out: &mut impl Write, cart: &CartView) -> std::io::Result<()> {
    if cart.items.is_empty() {
        writeln!(out, "cart is empty")?;
    }

    for line in &cart.items {
        let name = line.product_name.as_deref().unwrap_or("(removed product)");

        write!(
            out,
            "{}  {name}  {} x {}  -{}  = {}",
            line.item_uuid,
            line.quantity,
            line.price_at_time,
            line.discount_applied,
            line.final_price
        )?;

        if let Some(code) = &line.coupon_code {
            write!(out, "  [{code}]")?;
        }

        if !line.is_purchasable {
            write!(out, "  (unavailable)")?;
        }

        if line.is_stale {
            write!(out, "  (stale)")?;
        }

        writeln!(out)?;
    }

    writeln!(out, "subtotal: {}", cart.subtotal)?;
    writeln!(out, "discount: {}", cart.discount_total)?;
    writeln!(out, "tax: {}", cart.tax)?;
    writeln!(out, "total: {}", cart.total)?;

    let codes: Vec<&str> = cart
        .available_coupons
        .iter()
        .map(|coupon| coupon.code.as_str())
        .collect();

    if codes.is_empty() {
        writeln!(out, "available coupons: none")
    } else {
        writeln!(out, "available coupons: {}", codes.join(", "))
    }
}
