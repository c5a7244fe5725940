//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! prepper cart list
//! prepper cart add 42 -q 2
//! prepper cart remove 7
//! prepper cart clear
//! ```

use sgtprepper_core::{CartItemId, CurrencyCode, ProductId};
use sgtprepper_storefront::Storefront;
use sgtprepper_storefront::services::lookup::ProductQuery;

use super::CliError;

/// Fetch and print the cart.
///
/// # Errors
///
/// Returns `CliError` if the cart cannot be fetched.
pub async fn list(storefront: &Storefront) -> Result<(), CliError> {
    let cart = storefront.cart();
    cart.fetch_cart().await?;

    let items = cart.items();
    if items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    let currency = CurrencyCode::default().code();
    for item in &items {
        println!(
            "{id:>6}  {qty:>3} x {name:<40} {total:>10} {currency}  {image}",
            id = item.id,
            qty = item.quantity,
            name = item.name().unwrap_or("(unnamed)"),
            total = item.line_total().round_dp(2),
            image = item.image_url,
        );
    }
    println!(
        "{count} item(s), subtotal {subtotal} {currency}",
        count = cart.count(),
        subtotal = cart.subtotal().round_dp(2),
    );
    Ok(())
}

/// Add a product, then print the new item count.
///
/// Records an `add_to_cart` analytics event when consent allows it.
///
/// # Errors
///
/// Returns `CliError` if the add or the re-fetch fails.
pub async fn add(storefront: &Storefront, product: &str, quantity: u32) -> Result<(), CliError> {
    let product_id = ProductId::new(product);
    storefront.cart().add_to_cart(&product_id, quantity).await?;

    add_breadcrumb("cart", "Added to cart", &[("product_id", product)]);

    let analytics = storefront.analytics();
    if analytics.init_from_stored_consent().await
        && let Some(record) = storefront
            .lookup()
            .get_product(&ProductQuery::by_id(product_id))
            .await
    {
        analytics.track_add_to_cart(&record, quantity).await;
    }

    println!("Cart now holds {} item(s)", storefront.cart().count());
    Ok(())
}

/// Remove one cart line.
///
/// # Errors
///
/// Returns `CliError` if the server rejects the delete.
pub async fn remove(storefront: &Storefront, item: &str) -> Result<(), CliError> {
    storefront
        .cart()
        .remove_from_cart(&CartItemId::new(item))
        .await?;
    println!("Removed {item}");
    Ok(())
}

/// Remove every line, reporting the ones that failed.
///
/// # Errors
///
/// Returns `CliError` if the cart cannot be fetched or any line could not
/// be removed.
pub async fn clear(storefront: &Storefront) -> Result<(), CliError> {
    let cart = storefront.cart();
    cart.fetch_cart().await?;

    let report = cart.clear_cart().await;
    println!("Removed {} line(s)", report.removed.len());
    for (id, message) in &report.failed {
        println!("Could not remove {id}: {message}");
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::PartialClear {
            failed: report.failed.len(),
        })
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
