//! Product lookup with memoisation.
//!
//! Cart lines only carry a thin product snapshot, so the cart enriches each
//! line with the full product record. The API exposes products under
//! several paths and older records are only reachable through some of
//! them, so a lookup walks a fixed list of strategies and remembers what it
//! found by id and by slug.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument};

use sgtprepper_core::{ProductId, slugify};

use crate::api::ApiClient;

const CACHE_CAPACITY: u64 = 1000;
const INDEX_KEY: &str = "products";

/// What is known about the product being looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub id: Option<ProductId>,
    pub slug: Option<String>,
    pub category_slug: Option<String>,
}

impl ProductQuery {
    #[must_use]
    pub fn by_id(id: impl Into<ProductId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }

    /// Build a query from a raw cart line.
    ///
    /// - id: `product.id`, then `productId`, then the line's own `id`
    /// - slug: `product.slug`, then `slug`, then the slugified
    ///   `product.name` / `name`
    /// - category: `product.category.slug`, then `category.slug`
    #[must_use]
    pub fn from_cart_item(item: &Value) -> Self {
        let product = item.get("product").filter(|p| p.is_object());
        let from_product = |key: &str| product.and_then(|p| p.get(key));

        let id = [from_product("id"), item.get("productId"), item.get("id")]
            .into_iter()
            .flatten()
            .find_map(ProductId::from_value);

        let slug = [from_product("slug"), item.get("slug")]
            .into_iter()
            .flatten()
            .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
            .map(str::to_string)
            .or_else(|| {
                [from_product("name"), item.get("name")]
                    .into_iter()
                    .flatten()
                    .find_map(Value::as_str)
                    .map(slugify)
                    .filter(|s| !s.is_empty())
            });

        let category_slug = [from_product("category"), item.get("category")]
            .into_iter()
            .flatten()
            .find_map(|c| c.get("slug").and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            id,
            slug,
            category_slug,
        }
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.slug.is_none()
    }
}

/// Memoising product lookup.
///
/// Cheap to clone; clones share the memo tables.
#[derive(Clone)]
pub struct ProductLookup {
    inner: Arc<ProductLookupInner>,
}

struct ProductLookupInner {
    api: ApiClient,
    by_id: Cache<String, Value>,
    by_slug: Cache<String, Value>,
    index: Cache<&'static str, Arc<Vec<Value>>>,
}

impl ProductLookup {
    /// Create a lookup whose memo entries live for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let build = || {
            Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build()
        };

        Self {
            inner: Arc::new(ProductLookupInner {
                api,
                by_id: build(),
                by_slug: build(),
                index: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            }),
        }
    }

    /// Find a product.
    ///
    /// Memo tables first, then in order: `/products/{id}`,
    /// `/products/all/{slug}`, `/products/{category}/{slug}`,
    /// `/products/{slug}`, and finally a scan of `/products`. Failures along
    /// the way are skipped, never returned. `None` means no strategy found
    /// the product.
    #[instrument(skip(self), fields(id = ?query.id, slug = ?query.slug))]
    pub async fn get_product(&self, query: &ProductQuery) -> Option<Value> {
        if query.is_empty() {
            return None;
        }

        if let Some(id) = &query.id
            && let Some(product) = self.inner.by_id.get(id.as_str()).await
        {
            debug!("Cache hit for product id");
            return Some(product);
        }
        if let Some(slug) = &query.slug
            && let Some(product) = self.inner.by_slug.get(slug).await
        {
            debug!("Cache hit for product slug");
            return Some(product);
        }

        for path in candidate_paths(query) {
            if let Some(product) = self.fetch_product(&path).await {
                self.remember(query, &product).await;
                return Some(product);
            }
        }

        let index = self.product_index().await?;
        let hit = index
            .iter()
            .find(|p| matches_query(p, query))
            .cloned()?;
        self.remember(query, &hit).await;
        Some(hit)
    }

    /// The full product collection, memoised.
    ///
    /// `None` when the collection could not be fetched.
    pub async fn product_index(&self) -> Option<Arc<Vec<Value>>> {
        if let Some(index) = self.inner.index.get(INDEX_KEY).await {
            return Some(index);
        }

        match self.inner.api.get_json("/products").await {
            Ok(Value::Array(products)) => {
                let index = Arc::new(products);
                self.inner.index.insert(INDEX_KEY, index.clone()).await;
                Some(index)
            }
            Ok(other) => {
                debug!(kind = json_kind(&other), "Product index is not an array");
                None
            }
            Err(e) => {
                debug!(error = %e, "Product index fetch failed");
                None
            }
        }
    }

    /// Drop every memoised product.
    pub fn invalidate(&self) {
        self.inner.by_id.invalidate_all();
        self.inner.by_slug.invalidate_all();
        self.inner.index.invalidate_all();
    }

    async fn fetch_product(&self, path: &str) -> Option<Value> {
        match self.inner.api.get_json(path).await {
            Ok(product) if is_product(&product) => Some(product),
            Ok(_) => {
                debug!(path, "Lookup returned no product");
                None
            }
            Err(e) => {
                debug!(path, error = %e, "Lookup strategy failed");
                None
            }
        }
    }

    /// Memoise `product` under its own id/slug and under the query's keys.
    async fn remember(&self, query: &ProductQuery, product: &Value) {
        let ids = product
            .get("id")
            .and_then(ProductId::from_value)
            .into_iter()
            .chain(query.id.clone());
        for id in ids {
            self.inner.by_id.insert(id.into(), product.clone()).await;
        }

        let slugs = product
            .get("slug")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .into_iter()
            .chain(query.slug.clone());
        for slug in slugs {
            self.inner.by_slug.insert(slug, product.clone()).await;
        }
    }
}

fn candidate_paths(query: &ProductQuery) -> Vec<String> {
    let mut paths = Vec::with_capacity(4);
    if let Some(id) = &query.id {
        paths.push(format!("/products/{}", urlencoding::encode(id.as_str())));
    }
    if let Some(slug) = &query.slug {
        let slug = urlencoding::encode(slug);
        paths.push(format!("/products/all/{slug}"));
        if let Some(category) = &query.category_slug {
            paths.push(format!(
                "/products/{}/{slug}",
                urlencoding::encode(category)
            ));
        }
        paths.push(format!("/products/{slug}"));
    }
    paths
}

fn is_product(value: &Value) -> bool {
    value.as_object().is_some_and(|o| !o.is_empty())
}

fn matches_query(product: &Value, query: &ProductQuery) -> bool {
    let id_match = query.id.as_ref().is_some_and(|id| {
        product.get("id").and_then(ProductId::from_value).as_ref() == Some(id)
    });
    let slug_match = query.slug.as_deref().is_some_and(|slug| {
        product.get("slug").and_then(Value::as_str) == Some(slug)
    });
    id_match || slug_match
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::auth::SessionStore;
    use crate::storage::MemoryStore;
    use crate::test_support::ScriptedTransport;
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    const BASE: &str = "http://localhost:4000/api";

    fn lookup_with(transport: &Arc<ScriptedTransport>) -> ProductLookup {
        let session = SessionStore::load(Arc::new(MemoryStore::new()));
        let api = ApiClient::new(transport.clone(), session, BASE);
        ProductLookup::new(api, Duration::from_secs(300))
    }

    fn url(path: &str) -> String {
        format!("{BASE}{path}")
    }

    #[tokio::test]
    async fn test_slug_lookup_is_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            &url("/products/all/foo"),
            StatusCode::OK,
            json!({"id": 1, "slug": "foo", "name": "Foo"}),
        );
        let lookup = lookup_with(&transport);

        let first = lookup.get_product(&ProductQuery::by_slug("foo")).await;
        let second = lookup.get_product(&ProductQuery::by_slug("foo")).await;

        assert_eq!(first, second);
        assert_eq!(first.unwrap()["name"], "Foo");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_hit_populates_id_memo_too() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            &url("/products/all/foo"),
            StatusCode::OK,
            json!({"id": 1, "slug": "foo"}),
        );
        let lookup = lookup_with(&transport);

        lookup.get_product(&ProductQuery::by_slug("foo")).await.unwrap();
        let by_id = lookup.get_product(&ProductQuery::by_id("1")).await;

        assert!(by_id.is_some());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_id_fetch_first() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            &url("/products/7"),
            StatusCode::OK,
            json!({"id": 7, "slug": "tent"}),
        );
        let lookup = lookup_with(&transport);

        let query = ProductQuery {
            id: Some(ProductId::new("7")),
            slug: Some("tent".to_string()),
            category_slug: None,
        };
        let product = lookup.get_product(&query).await.unwrap();

        assert_eq!(product["slug"], "tent");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_strategies_in_order_with_errors_swallowed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            &url("/products/all/tent"),
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "boom"}),
        );
        transport.on(
            Method::GET,
            &url("/products/outdoor/tent"),
            StatusCode::OK,
            json!({"id": 3, "slug": "tent"}),
        );
        let lookup = lookup_with(&transport);

        let query = ProductQuery {
            id: None,
            slug: Some("tent".to_string()),
            category_slug: Some("outdoor".to_string()),
        };
        let product = lookup.get_product(&query).await.unwrap();

        assert_eq!(product["id"], 3);
        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![url("/products/all/tent"), url("/products/outdoor/tent")]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_index_scan() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::GET,
            &url("/products"),
            StatusCode::OK,
            json!([{"id": 1, "slug": "a"}, {"id": "2", "slug": "b"}]),
        );
        let lookup = lookup_with(&transport);

        let product = lookup.get_product(&ProductQuery::by_id("2")).await.unwrap();

        assert_eq!(product["slug"], "b");
        // /products/2 (404) then /products
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_returns_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, &url("/products"), StatusCode::OK, json!([]));
        let lookup = lookup_with(&transport);

        assert!(lookup.get_product(&ProductQuery::by_slug("nope")).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        let lookup = lookup_with(&transport);

        assert!(lookup.get_product(&ProductQuery::default()).await.is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failures_are_swallowed() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..5 {
            transport.fail("offline");
        }
        let lookup = lookup_with(&transport);

        assert!(lookup.get_product(&ProductQuery::by_slug("x")).await.is_none());
    }

    #[tokio::test]
    async fn test_null_payload_is_a_miss() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::GET, &url("/products/all/x"), StatusCode::OK, json!(null));
        transport.on(
            Method::GET,
            &url("/products/x"),
            StatusCode::OK,
            json!({"id": 5, "slug": "x"}),
        );
        let lookup = lookup_with(&transport);

        let product = lookup.get_product(&ProductQuery::by_slug("x")).await.unwrap();
        assert_eq!(product["id"], 5);
    }

    #[tokio::test]
    async fn test_slug_segments_are_encoded() {
        let transport = Arc::new(ScriptedTransport::new());
        let lookup = lookup_with(&transport);

        lookup.get_product(&ProductQuery::by_slug("a b/c")).await;

        assert_eq!(transport.requests()[0].url, url("/products/all/a%20b%2Fc"));
    }

    #[test]
    fn test_query_from_cart_item_prefers_product_fields() {
        let item = json!({
            "id": 100,
            "productId": 5,
            "product": {"id": 6, "slug": "stove", "category": {"slug": "cooking"}}
        });
        let query = ProductQuery::from_cart_item(&item);
        assert_eq!(query.id, Some(ProductId::new("6")));
        assert_eq!(query.slug.as_deref(), Some("stove"));
        assert_eq!(query.category_slug.as_deref(), Some("cooking"));
    }

    #[test]
    fn test_query_from_cart_item_fallbacks() {
        let item = json!({"id": 100, "productId": 5, "name": "Water Filter Pro"});
        let query = ProductQuery::from_cart_item(&item);
        assert_eq!(query.id, Some(ProductId::new("5")));
        assert_eq!(query.slug.as_deref(), Some("water-filter-pro"));
        assert_eq!(query.category_slug, None);
    }

    #[test]
    fn test_query_from_cart_item_line_id_last() {
        let query = ProductQuery::from_cart_item(&json!({"id": "line-1"}));
        assert_eq!(query.id, Some(ProductId::new("line-1")));
        assert_eq!(query.slug, None);
    }
}
