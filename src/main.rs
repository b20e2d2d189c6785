//! Storefront CLI - terminal client for the shop API
//!
//! Browse the catalog, manage a server-side cart and pay for orders from the
//! command line.

mod api;
mod auth;
mod cart;
mod checkout;
mod commands;
mod config;
mod models;
mod storefront;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::CheckoutArgs;
use crate::models::{ProductFilter, ProfileUpdate, Registration};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Command-line client for the storefront API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API base URL (overrides STOREFRONT_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        password: String,

        /// Repeat of the password
        #[arg(long)]
        password_confirm: String,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Log out and clear stored tokens
    Logout,

    /// Show session and token status
    Status,

    /// Show the logged-in user's profile
    Whoami,

    /// Update profile fields
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },

    /// List products
    Products {
        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Category ID
        #[arg(short, long)]
        category: Option<u64>,
    },

    /// Show one product
    Product { id: u64 },

    /// List product categories
    Categories,

    /// Show the cart
    Cart,

    /// Add a product to the cart
    Add {
        product_id: u64,

        #[arg(short, long, default_value = "1")]
        quantity: u32,
    },

    /// Change the quantity of a cart line (0 removes it)
    Update { item_id: u64, quantity: u32 },

    /// Remove a cart line
    Remove { item_id: u64 },

    /// Empty the cart
    Clear,

    /// Place an order for the cart and pay for it
    Checkout {
        /// Shipping address (defaults to the profile address)
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        country: Option<String>,

        /// Saved payment method ID (e.g. pm_card_visa)
        #[arg(long, conflicts_with = "card")]
        payment_method: Option<String>,

        /// Card number
        #[arg(long)]
        card: Option<String>,

        /// Card expiry as MM/YY
        #[arg(long)]
        exp: Option<String>,

        #[arg(long)]
        cvc: Option<String>,
    },

    /// List your orders
    Orders,

    /// Show one order
    Order { id: u64 },

    /// Record a completed payment on its order
    Reconcile {
        order_id: u64,
        payment_intent_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut shop = commands::open(cli.api_url.as_deref()).await?;

    match cli.command {
        Commands::Login { email, password } => {
            tracing::info!("Logging in...");
            commands::login(&mut shop, email, password).await?;
        }
        Commands::Register {
            email,
            first_name,
            last_name,
            password,
            password_confirm,
            phone,
        } => {
            let registration = Registration {
                email,
                first_name,
                last_name,
                password,
                password_confirm,
                phone_number: phone,
            };
            commands::register(&mut shop, registration).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            commands::logout(&mut shop);
        }
        Commands::Status => {
            commands::status(&shop);
        }
        Commands::Whoami => {
            commands::whoami(&shop)?;
        }
        Commands::Profile {
            first_name,
            last_name,
            phone,
            address,
            city,
            state,
            postal_code,
            country,
        } => {
            let changes = ProfileUpdate {
                first_name,
                last_name,
                phone_number: phone,
                address,
                city,
                state,
                postal_code,
                country,
            };
            commands::update_profile(&mut shop, changes).await?;
        }
        Commands::Products { search, category } => {
            commands::list_products(&shop, ProductFilter { search, category }).await?;
        }
        Commands::Product { id } => {
            commands::show_product(&shop, id).await?;
        }
        Commands::Categories => {
            commands::list_categories(&shop).await?;
        }
        Commands::Cart => {
            commands::show_cart(&shop)?;
        }
        Commands::Add {
            product_id,
            quantity,
        } => {
            commands::add_to_cart(&mut shop, product_id, quantity).await?;
        }
        Commands::Update { item_id, quantity } => {
            commands::update_cart_item(&mut shop, item_id, quantity).await?;
        }
        Commands::Remove { item_id } => {
            commands::remove_from_cart(&mut shop, item_id).await?;
        }
        Commands::Clear => {
            commands::clear_cart(&mut shop).await?;
        }
        Commands::Checkout {
            address,
            city,
            postal_code,
            country,
            payment_method,
            card,
            exp,
            cvc,
        } => {
            let args = CheckoutArgs {
                address,
                city,
                postal_code,
                country,
                payment_method,
                card,
                exp,
                cvc,
            };
            commands::checkout(&mut shop, args).await?;
        }
        Commands::Orders => {
            commands::list_orders(&shop).await?;
        }
        Commands::Order { id } => {
            commands::show_order(&shop, id).await?;
        }
        Commands::Reconcile {
            order_id,
            payment_intent_id,
        } => {
            commands::reconcile(&shop, order_id, &payment_intent_id).await?;
        }
    }

    Ok(())
}
