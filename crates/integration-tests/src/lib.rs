//! Integration tests for the Sgt. Prepper storefront client.
//!
//! Every test drives a real [`Storefront`] over [`FakeApi`], an in-process
//! stand-in for the commerce API. No network is involved.
//!
//! # Test Categories
//!
//! - `auth_refresh` - Token refresh and retry through the full context
//! - `session_persistence` - Session and consent surviving a restart
//! - `cart_flow` - Fetch, enrich, add, remove and clear
//! - `analytics_consent` - Consent gating of analytics events

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use sgtprepper_storefront::Storefront;
use sgtprepper_storefront::api::{ApiError, ApiRequest, ApiResponse, Transport};
use sgtprepper_storefront::config::StorefrontConfig;
use sgtprepper_storefront::services::analytics::SharedTracker;
use sgtprepper_storefront::storage::SharedStore;

/// API base every test storefront points at.
pub const BASE_URL: &str = "http://shop.test/api";

type Handler = Arc<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// In-process commerce API.
///
/// Routes are matched on method and path (relative to [`BASE_URL`]).
/// Unrouted requests get a 404.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<(Method, String), Handler>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `method path` with a fixed JSON response.
    pub fn json(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.route(method, path, move |_| ApiResponse::json_body(status, &body));
    }

    /// Answer `method path` by calling `handler`.
    pub fn route<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Arc::new(handler));
    }

    /// Every request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `method path`.
    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        let url = format!("{BASE_URL}{path}");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(request.url.as_str())
            .to_string();
        let handler = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method.clone(), path))
            .cloned();

        Ok(handler.map_or_else(
            || ApiResponse::empty(StatusCode::NOT_FOUND),
            |handler| handler(&request),
        ))
    }
}

/// The bearer token a request carried, if any.
#[must_use]
pub fn bearer(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Build a storefront over `api` and `storage`.
#[must_use]
pub fn storefront(
    api: &Arc<FakeApi>,
    storage: SharedStore,
    tracker: Option<SharedTracker>,
) -> Storefront {
    let mut config = StorefrontConfig::for_base_url(BASE_URL).unwrap();
    config.analytics.measurement_id = Some("G-TEST".to_string());
    Storefront::new(config, storage, api.clone(), tracker)
}
