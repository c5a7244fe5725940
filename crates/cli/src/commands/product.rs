//! Product, category and image commands.

use serde_json::Value;
use sgtprepper_core::ProductId;
use sgtprepper_storefront::{Storefront, StorefrontError};
use sgtprepper_storefront::services::lookup::ProductQuery;

use super::{CliError, print_json};

/// Look up one product and print it with its resolved image.
///
/// # Errors
///
/// Returns `CliError` if neither `id` nor `slug` is given.
pub async fn get(
    storefront: &Storefront,
    id: Option<String>,
    slug: Option<String>,
    category: Option<String>,
) -> Result<(), CliError> {
    if id.is_none() && slug.is_none() {
        return Err(StorefrontError::InvalidInput("give --id or --slug".to_string()).into());
    }

    let query = ProductQuery {
        id: id.map(ProductId::new),
        slug,
        category_slug: category,
    };

    match storefront.lookup().get_product(&query).await {
        Some(product) => {
            print_json(&product)?;
            println!("image: {}", storefront.images().resolve_or_placeholder(&product));
        }
        None => println!("Product not found"),
    }
    Ok(())
}

/// Print the category list.
///
/// # Errors
///
/// Returns `CliError::Categories` if the list could not be loaded.
pub async fn categories(storefront: &Storefront) -> Result<(), CliError> {
    let categories = storefront.categories();
    categories.ensure_loaded().await;

    if let Some(message) = categories.error() {
        return Err(CliError::Categories(message));
    }

    for category in categories.categories() {
        let name = category.get("name").and_then(Value::as_str).unwrap_or("");
        let slug = category.get("slug").and_then(Value::as_str).unwrap_or("");
        println!("{slug:<24} {name}");
    }
    Ok(())
}

/// Resolve the image of a product given as JSON.
///
/// # Errors
///
/// Returns `CliError::InvalidJson` if `json` does not parse.
pub fn image(storefront: &Storefront, json: &str) -> Result<(), CliError> {
    let candidate: Value = serde_json::from_str(json)?;
    println!("{}", storefront.images().resolve_or_placeholder(&candidate));
    Ok(())
}
