//! Command handlers: each runs one user action against the storefront and
//! prints the result.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;

use crate::api::ApiClient;
use crate::auth::{token_expiry, SessionStatus};
use crate::cart::CartSynchronizer;
use crate::checkout::{CardDetails, PaymentDetails, PaymentMethod, PaymentOutcome};
use crate::config::{Config, ConfigTokenStore};
use crate::models::{
    Cart, Credentials, Order, Product, ProductFilter, ProfileUpdate, Registration, ShippingInfo,
    User,
};
use crate::storefront::Storefront;

/// Build the storefront from the on-disk config and restore any session.
pub async fn open(api_url: Option<&str>) -> Result<Storefront> {
    let store = Arc::new(ConfigTokenStore::open(Config::config_path()?)?);
    let base_url = store.config().api_url(api_url);
    tracing::debug!("Using API at {}", base_url);

    let api = ApiClient::connect(&base_url, store).context("Invalid API URL")?;
    let mut shop = Storefront::new(Arc::new(api));
    shop.start().await;
    Ok(shop)
}

fn require_login(shop: &Storefront) -> Result<()> {
    if !shop.session().is_authenticated() {
        bail!("Not logged in. Run 'storefront login' first.");
    }
    Ok(())
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

pub async fn login(shop: &mut Storefront, email: String, password: String) -> Result<()> {
    shop.login(&Credentials { email, password }).await?;
    if let Some(user) = shop.session().user() {
        println!("Logged in as {}.", user.display_name());
    }
    print_cart_line(shop);
    Ok(())
}

pub async fn register(shop: &mut Storefront, registration: Registration) -> Result<()> {
    shop.register(&registration).await?;
    println!("Account created for {}.", registration.email);
    Ok(())
}

pub fn logout(shop: &mut Storefront) {
    shop.logout();
    println!("Logged out.");
}

/// Display session and token status
pub fn status(shop: &Storefront) {
    let session = shop.session();
    println!("Session:     {}", session_line(session.status(), session.user()));
    if let Some(error) = shop.session().error() {
        println!("Last error:  {}", error);
    }

    let tokens = shop.api().tokens();
    match tokens.load() {
        Some(pair) => {
            match token_expiry(&pair.access) {
                Some(exp) => println!("Access tok:  present (exp {})", exp.to_rfc3339()),
                None => println!("Access tok:  present"),
            }
            println!("Refresh tok: present");
        }
        None if tokens.access_token().is_some() => {
            println!("Access tok:  present");
            println!("Refresh tok: none");
        }
        None => println!("Tokens:      none"),
    }

    if shop.session().is_authenticated() {
        println!("{}", cart_line(shop.cart()));
    } else {
        println!("\nRun 'storefront login' to authenticate.");
    }
}

fn session_line(status: SessionStatus, user: Option<&User>) -> String {
    match (status, user) {
        (SessionStatus::Authenticated, Some(user)) => {
            format!("authenticated as {} <{}>", user.display_name(), user.email)
        }
        (SessionStatus::Loading, _) => "loading".to_string(),
        (SessionStatus::Error, _) => "error".to_string(),
        _ => "anonymous".to_string(),
    }
}

pub fn whoami(shop: &Storefront) -> Result<()> {
    require_login(shop)?;
    let Some(user) = shop.session().user() else {
        return Ok(());
    };

    println!();
    println!("Name:     {}", user.display_name());
    println!("Email:    {}", user.email);
    println!("Phone:    {}", user.phone_number.as_deref().unwrap_or("(none)"));
    println!(
        "Address:  {}",
        [
            user.address.as_deref(),
            user.city.as_deref(),
            user.postal_code.as_deref(),
            user.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    );
    println!("ID:       {}", user.id);
    Ok(())
}

pub async fn update_profile(shop: &mut Storefront, changes: ProfileUpdate) -> Result<()> {
    require_login(shop)?;
    if changes.is_empty() {
        bail!("Nothing to update.");
    }
    shop.update_profile(&changes).await?;
    println!("Profile updated.");
    Ok(())
}

pub async fn list_products(shop: &Storefront, filter: ProductFilter) -> Result<()> {
    let products = shop.api().products(&filter).await?;

    println!("\nProducts:");
    println!("{:-<60}", "");
    if products.is_empty() {
        println!("  (no products found)");
        return Ok(());
    }
    for product in &products {
        print_product_line(product);
    }
    Ok(())
}

fn print_product_line(product: &Product) {
    let stock = if product.is_in_stock {
        format!("{} in stock", product.stock)
    } else {
        "out of stock".to_string()
    };
    println!(
        "[{}] {} - {} ({})",
        product.id,
        product.name,
        money(product.price),
        stock
    );
    if let Some(ref category) = product.category_name {
        println!("  Category: {}", category);
    }
}

pub async fn show_product(shop: &Storefront, id: u64) -> Result<()> {
    let product = shop.api().product(id).await?;
    println!();
    print_product_line(&product);
    if let Some(ref description) = product.description {
        if !description.trim().is_empty() {
            println!();
            println!("{}", description.trim());
        }
    }
    Ok(())
}

pub async fn list_categories(shop: &Storefront) -> Result<()> {
    let categories = shop.api().categories().await?;
    if categories.is_empty() {
        println!("(no categories)");
    }
    for category in &categories {
        println!("[{}] {}", category.id, category.name);
    }
    Ok(())
}

fn cart_line(sync: &CartSynchronizer) -> String {
    if sync.is_loading() {
        return "Cart:        loading".to_string();
    }
    match (sync.cart(), sync.error()) {
        (Some(cart), _) => format!(
            "Cart:        {} item(s), {}",
            sync.item_count(),
            money(cart.total_price)
        ),
        (None, Some(error)) => format!("Cart:        {}", error),
        (None, None) => "Cart:        unavailable".to_string(),
    }
}

fn print_cart_line(shop: &Storefront) {
    if shop.session().is_authenticated() {
        println!("{}", cart_line(shop.cart()));
    }
}

fn print_cart(cart: &Cart) {
    println!("\nCart:");
    println!("{:-<60}", "");
    if cart.is_empty() {
        println!("  (empty)");
        return;
    }
    for item in &cart.items {
        println!(
            "[{}] {} x{} - {}",
            item.id,
            item.product.name,
            item.quantity,
            money(item.total_price)
        );
    }
    println!("{:-<60}", "");
    println!("Total: {}", money(cart.total_price));
}

pub fn show_cart(shop: &Storefront) -> Result<()> {
    require_login(shop)?;
    match shop.cart().cart() {
        Some(cart) => print_cart(cart),
        None => bail!(
            "{}",
            shop.cart().error().unwrap_or("Cart is not available")
        ),
    }
    Ok(())
}

pub async fn add_to_cart(shop: &mut Storefront, product_id: u64, quantity: u32) -> Result<()> {
    require_login(shop)?;
    shop.add_to_cart(product_id, quantity).await?;
    println!("Added to cart.");
    print_cart_line(shop);
    Ok(())
}

pub async fn update_cart_item(shop: &mut Storefront, item_id: u64, quantity: u32) -> Result<()> {
    require_login(shop)?;
    shop.update_cart_item(item_id, quantity).await?;
    println!("Cart updated.");
    print_cart_line(shop);
    Ok(())
}

pub async fn remove_from_cart(shop: &mut Storefront, item_id: u64) -> Result<()> {
    require_login(shop)?;
    shop.remove_from_cart(item_id).await?;
    println!("Item removed.");
    print_cart_line(shop);
    Ok(())
}

pub async fn clear_cart(shop: &mut Storefront) -> Result<()> {
    require_login(shop)?;
    shop.clear_cart().await?;
    println!("Cart cleared.");
    Ok(())
}

/// Shipping and payment arguments for `checkout`
pub struct CheckoutArgs {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_method: Option<String>,
    pub card: Option<String>,
    pub exp: Option<String>,
    pub cvc: Option<String>,
}

/// Parse `MM/YY` or `MM/YYYY`.
fn parse_expiry(exp: &str) -> Result<(u8, u16)> {
    let (month, year) = exp
        .split_once('/')
        .context("Expiry must look like MM/YY")?;
    let month: u8 = month.trim().parse().context("Invalid expiry month")?;
    let mut year: u16 = year.trim().parse().context("Invalid expiry year")?;
    if !(1..=12).contains(&month) {
        bail!("Invalid expiry month: {}", month);
    }
    if year < 100 {
        year += 2000;
    }
    Ok((month, year))
}

fn payment_method(args: &CheckoutArgs) -> Result<PaymentMethod> {
    if let Some(ref id) = args.payment_method {
        return Ok(PaymentMethod::Saved(id.clone()));
    }
    let number = args
        .card
        .clone()
        .context("Provide --payment-method or --card/--exp/--cvc")?;
    let (exp_month, exp_year) = parse_expiry(args.exp.as_deref().context("Missing --exp")?)?;
    let cvc = args.cvc.clone().context("Missing --cvc")?;
    Ok(PaymentMethod::Card(CardDetails {
        number: number.replace(' ', ""),
        exp_month,
        exp_year,
        cvc,
    }))
}

pub async fn checkout(shop: &mut Storefront, args: CheckoutArgs) -> Result<()> {
    require_login(shop)?;
    let method = payment_method(&args)?;

    let user = shop.session().user().cloned();
    let mut shipping = user
        .as_ref()
        .map(ShippingInfo::from_user)
        .unwrap_or_default();
    if let Some(address) = args.address {
        shipping.shipping_address = address;
    }
    if let Some(city) = args.city {
        shipping.shipping_city = city;
    }
    if let Some(postal_code) = args.postal_code {
        shipping.shipping_postal_code = postal_code;
    }
    if let Some(country) = args.country {
        shipping.shipping_country = country;
    }

    let provider = shop
        .checkout()
        .stripe_provider()
        .await
        .context("Failed to initialize payment system")?;

    let pending = shop.create_order(&shipping).await?;
    let order_id = pending.order_id;
    println!(
        "Order #{} created, total {}.",
        pending.order_id,
        money(pending.amount)
    );

    let details = PaymentDetails {
        method,
        billing_name: user.as_ref().map(|u| u.display_name()),
    };
    println!("Processing payment...");
    let outcome = shop.confirm_payment(pending, &provider, &details).await;
    for line in outcome_lines(&outcome) {
        println!("{}", line);
    }
    if !outcome.is_paid() {
        bail!("Order #{} was not paid", order_id);
    }
    Ok(())
}

fn outcome_lines(outcome: &PaymentOutcome) -> Vec<String> {
    let Some(receipt) = outcome.receipt() else {
        return match outcome {
            PaymentOutcome::Failed { reason } => vec![format!("Payment failed: {}", reason)],
            _ => Vec::new(),
        };
    };
    let mut lines = vec![
        "Payment Successful!".to_string(),
        format!("  Order:   #{}", receipt.order_id),
        format!("  Payment: {}", receipt.payment_intent_id),
        format!("  Amount:  {}", money(receipt.amount)),
    ];
    if let PaymentOutcome::ReconciliationPending { .. } = outcome {
        lines.push(format!(
            "Note: the order record is not updated yet. Retry with \
             'storefront reconcile {} {}'.",
            receipt.order_id, receipt.payment_intent_id
        ));
    }
    lines
}

pub async fn reconcile(shop: &Storefront, order_id: u64, payment_intent_id: &str) -> Result<()> {
    require_login(shop)?;
    let order = shop
        .api()
        .confirm_order_payment(order_id, payment_intent_id)
        .await?;
    println!("Order #{} is now {}.", order.id, order.status);
    Ok(())
}

fn print_order(order: &Order) {
    let created = order
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!(
        "#{} {} {} {} {}",
        order.id,
        created,
        order.status,
        money(order.total_amount),
        if order.is_paid { "paid" } else { "unpaid" }
    );
}

pub async fn list_orders(shop: &Storefront) -> Result<()> {
    require_login(shop)?;
    let orders = shop.api().orders().await?;
    if orders.is_empty() {
        println!("(no orders)");
    }
    for order in &orders {
        print_order(order);
    }
    Ok(())
}

pub async fn show_order(shop: &Storefront, id: u64) -> Result<()> {
    require_login(shop)?;
    let order = shop.api().order(id).await?;
    print_order(&order);
    println!(
        "  Ship to: {}, {} {}, {}",
        order.shipping_address,
        order.shipping_city,
        order.shipping_postal_code,
        order.shipping_country
    );
    for item in &order.items {
        println!(
            "  {} x{} - {}",
            item.product_name.as_deref().unwrap_or("(product)"),
            item.quantity,
            money(item.total_price)
        );
    }
    Ok(())
}
