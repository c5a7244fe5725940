//! Cart state.
//!
//! The server owns the cart; this module keeps the last fetched copy,
//! enriched with full product records and a resolved image per line.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use sgtprepper_core::{CartItemId, ProductId, parse_price};

use super::lookup::{ProductLookup, ProductQuery};
use crate::api::{ApiClient, ApiError, ApiResponse, RequestOptions};
use crate::image::ImageResolver;

/// One enriched cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: Option<ProductId>,
    pub quantity: u32,
    /// Full product record when the lookup found one, otherwise the
    /// snapshot embedded in the cart line (or `null`).
    pub product: Value,
    /// Absolute image URL. Never empty; the placeholder when nothing else
    /// resolved.
    pub image_url: String,
    /// The line as the server sent it.
    pub raw: Value,
}

impl CartItem {
    /// Unit price: `product.price`, falling back to the line's `price`.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.product
            .get("price")
            .filter(|p| !p.is_null())
            .or_else(|| self.raw.get("price"))
            .map(parse_price)
            .unwrap_or_default()
    }

    /// `unit_price × quantity`, saturating at the decimal range.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price().saturating_mul(Decimal::from(self.quantity))
    }

    /// Display name, if the product record has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.product
            .get("name")
            .or_else(|| self.raw.get("name"))
            .and_then(Value::as_str)
    }
}

/// Outcome of [`CartState::clear_cart`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearCartReport {
    pub removed: Vec<CartItemId>,
    pub failed: Vec<(CartItemId, String)>,
}

impl ClearCartReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
struct CartSnapshot {
    items: Vec<CartItem>,
    loading: bool,
    error: Option<String>,
}

/// Shared cart state for one storefront context.
#[derive(Clone)]
pub struct CartState {
    inner: Arc<CartStateInner>,
}

struct CartStateInner {
    api: ApiClient,
    lookup: ProductLookup,
    images: ImageResolver,
    state: RwLock<CartSnapshot>,
}

impl CartState {
    #[must_use]
    pub fn new(api: ApiClient, lookup: ProductLookup, images: ImageResolver) -> Self {
        Self {
            inner: Arc::new(CartStateInner {
                api,
                lookup,
                images,
                state: RwLock::new(CartSnapshot::default()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CartSnapshot> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CartSnapshot> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the cart from the server and enrich every line.
    ///
    /// A body that is not an array yields an empty cart. Lines whose
    /// product cannot be found keep their embedded snapshot and get the
    /// placeholder image.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the cart itself could not be fetched; the
    /// message is also kept in [`Self::error`] and the previous items stay.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<(), ApiError> {
        {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
        }

        let payload = match self.inner.api.get_json("/cart").await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to fetch cart");
                let mut state = self.write();
                state.loading = false;
                state.error = Some(e.to_string());
                return Err(e);
            }
        };

        let raw_items = match payload {
            Value::Array(items) => items,
            _ => {
                debug!("Cart body is not an array, treating as empty");
                Vec::new()
            }
        };

        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            if let Some(item) = self.enrich(raw).await {
                items.push(item);
            }
        }

        info!(lines = items.len(), "Cart loaded");

        let mut state = self.write();
        state.items = items;
        state.loading = false;
        Ok(())
    }

    async fn enrich(&self, raw: Value) -> Option<CartItem> {
        let Some(id) = raw.get("id").and_then(CartItemId::from_value) else {
            warn!("Cart line without an id, skipping");
            return None;
        };

        let query = ProductQuery::from_cart_item(&raw);
        let product = match self.inner.lookup.get_product(&query).await {
            Some(full) => full,
            None => {
                debug!(item = %id, "No product record found, keeping snapshot");
                raw.get("product")
                    .filter(|p| p.is_object())
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        };

        let images = &self.inner.images;
        let mut image_url = images.resolve(&product);
        if image_url.is_empty() {
            image_url = images.resolve_or_placeholder(&raw);
        }

        let product_id = product
            .get("id")
            .and_then(ProductId::from_value)
            .or_else(|| raw.get("productId").and_then(ProductId::from_value));

        Some(CartItem {
            id,
            product_id,
            quantity: quantity_of(&raw),
            product,
            image_url,
            raw,
        })
    }

    /// Add `quantity` of a product, then re-fetch the whole cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the POST or the re-fetch fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        self.write().error = None;

        let body = json!({ "productId": product_id, "quantity": quantity });
        let result = self
            .inner
            .api
            .request("/cart", RequestOptions::post_json(body))
            .await
            .and_then(ApiResponse::error_for_status);

        if let Err(e) = result {
            warn!(error = %e, "Failed to add to cart");
            self.write().error = Some(e.to_string());
            return Err(e);
        }

        self.fetch_cart().await
    }

    /// Delete one line. Only that line is removed locally, and only when
    /// the server accepted the delete.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the DELETE fails; the local items are left
    /// as they were.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_from_cart(&self, item_id: &CartItemId) -> Result<(), ApiError> {
        self.write().error = None;

        let path = format!("/cart/{}", urlencoding::encode(item_id.as_str()));
        let result = self
            .inner
            .api
            .request(&path, RequestOptions::delete())
            .await
            .and_then(ApiResponse::error_for_status);

        match result {
            Ok(_) => {
                self.write().items.retain(|item| &item.id != item_id);
                debug!("Cart line removed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove cart line");
                self.write().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Remove every line, one at a time.
    ///
    /// Failures are collected and the remaining lines are still attempted.
    /// [`Self::error`] holds the last failure message.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> ClearCartReport {
        let ids: Vec<CartItemId> = self.read().items.iter().map(|i| i.id.clone()).collect();
        let mut report = ClearCartReport::default();
        let mut last_error = None;

        for id in ids {
            match self.remove_from_cart(&id).await {
                Ok(()) => report.removed.push(id),
                Err(e) => {
                    let message = e.to_string();
                    last_error = Some(message.clone());
                    report.failed.push((id, message));
                }
            }
        }

        if last_error.is_some() {
            self.write().error = last_error;
        }

        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Cart cleared"
        );
        report
    }

    /// Snapshot of the current lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.read().items.clone()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.read().items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of `price × quantity` over all lines, saturating at the decimal
    /// range.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.read()
            .items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Whether a fetch is in flight. Advisory only.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Message of the last failed operation, cleared when the next one starts.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}

/// Line quantity. Missing or unreadable quantities count as zero.
fn quantity_of(raw: &Value) -> u32 {
    let quantity = match raw.get("quantity") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    quantity.map_or(0, |q| u32::try_from(q).unwrap_or(u32::MAX))
}
