//! Consent and analytics commands.
//!
//! # Usage
//!
//! ```bash
//! prepper consent show
//! prepper consent set --analytics true --marketing false
//! prepper track page-view "/produkter?side=2" --title Produkter
//! ```

use sgtprepper_core::Consent;
use sgtprepper_storefront::Storefront;
use sgtprepper_storefront::services::analytics::PageView;

use super::{CliError, print_json};

/// Print the stored consent record.
///
/// # Errors
///
/// Returns `CliError` if the record cannot be printed.
pub fn show(storefront: &Storefront) -> Result<(), CliError> {
    match storefront.analytics().consent().get_consent() {
        Some(consent) => print_json(&serde_json::to_value(consent)?),
        None => {
            println!("No consent recorded");
            Ok(())
        }
    }
}

/// Merge the given flags into the stored record.
///
/// # Errors
///
/// Returns `CliError` if the record cannot be stored.
pub fn set(
    storefront: &Storefront,
    analytics: Option<bool>,
    marketing: Option<bool>,
    all: Option<bool>,
) -> Result<(), CliError> {
    let partial = Consent {
        analytics,
        marketing,
        all,
        ..Consent::default()
    };
    let next = storefront.analytics().consent().set_consent(&partial)?;
    print_json(&serde_json::to_value(next)?)
}

/// Record a page view if consent allows analytics.
pub async fn page_view(storefront: &Storefront, path: &str, title: Option<String>) {
    let analytics = storefront.analytics();
    if !analytics.init_from_stored_consent().await {
        println!("Analytics disabled (no consent or no tracker configured)");
        return;
    }

    let page = PageView {
        path: path.to_string(),
        title: title.unwrap_or_default(),
        location: format!(
            "{}/{}",
            storefront.config().api.static_base(),
            path.trim_start_matches('/')
        ),
    };
    analytics.track_page_view(&page).await;
    println!("Page view recorded");
}
