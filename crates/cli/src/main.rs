//! Tienda CLI - cart and order management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart of the user whose token is in TIENDA_API_TOKEN
//! tienda cart show
//!
//! # Add two units of a product
//! tienda cart add 64f1c0ffee -q 2
//!
//! # Change quantities (buffered, then flushed in one go)
//! tienda cart set 64f1c0ffee=3 64f2c0ffee=1
//!
//! # Save a line for later, and bring it back
//! tienda cart save 64f1c0ffee
//! tienda cart restore 64f1c0ffee -q 1
//!
//! # Remove a line, or empty the cart
//! tienda cart remove 64f1c0ffee
//! tienda cart clear
//!
//! # Place an order
//! tienda checkout --name "Ana Gómez" --street "Av. Corrientes 1234" \
//!     --city "Buenos Aires" --postal-code C1043 --phone "+54 11 5555 0000" \
//!     --payment transferencia
//!
//! # List past orders
//! tienda orders
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tienda_storefront::{PaymentMethod, StorefrontConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda storefront cart and checkout client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the current cart
    Checkout {
        /// Recipient name
        #[arg(long)]
        name: String,

        /// Street and number
        #[arg(long)]
        street: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        postal_code: String,

        #[arg(long, default_value = "Argentina")]
        country: String,

        #[arg(long)]
        phone: String,

        /// Payment method (`mercadopago`, `transferencia`, `efectivo`)
        #[arg(long, default_value = "mercadopago")]
        payment: PaymentMethod,

        /// Delivery notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// List past orders
    Orders,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show lines and total
    Show,
    /// Add units of a product
    Add {
        product_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set quantities as `PRODUCT_ID=QUANTITY` pairs and save them
    Set {
        #[arg(required = true, value_parser = commands::cart::parse_edit)]
        edits: Vec<(String, i64)>,
    },
    /// Move a product to the saved-for-later list
    Save { product_id: String },
    /// Move a saved product back into the cart
    Restore {
        product_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove { product_id: String },
    /// Remove every product
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    if let Some(slug) = &config.tienda_slug {
        sentry::configure_scope(|scope| scope.set_tag("tienda", slug));
    }

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tienda_storefront=info,tienda_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed for Sentry, which must be set up before tracing
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> tienda_storefront::Result<()> {
    let cart = commands::connect(config)?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&cart, config).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&cart, config, &product_id, quantity).await?,
            CartAction::Set { edits } => commands::cart::set(&cart, config, &edits).await?,
            CartAction::Save { product_id } => {
                commands::cart::save(&cart, config, &product_id).await?;
            }
            CartAction::Restore {
                product_id,
                quantity,
            } => commands::cart::restore(&cart, config, &product_id, quantity).await?,
            CartAction::Remove { product_id } => {
                commands::cart::remove(&cart, config, &product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(&cart).await?,
        },
        Commands::Checkout {
            name,
            street,
            city,
            postal_code,
            country,
            phone,
            payment,
            notes,
        } => {
            let details = tienda_storefront::CheckoutDetails {
                address: tienda_storefront::ShippingAddress {
                    name,
                    street,
                    city,
                    postal_code,
                    country,
                    phone,
                },
                payment_method: payment,
                notes,
            };
            commands::orders::checkout(&cart, config, &details).await?;
        }
        Commands::Orders => commands::orders::list(&cart, config).await?,
    }
    Ok(())
}
