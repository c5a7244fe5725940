//! Authenticated API client with a single token refresh per request.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use super::ApiError;
use super::request::{ApiRequest, ApiResponse, RequestBody, RequestOptions};
use super::transport::SharedTransport;
use crate::services::auth::{SessionStore, bearer_value};

/// Path of the token refresh endpoint, relative to the API base.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Where a request is in the refresh-and-retry policy.
///
/// A request starts `Fresh`. A 401 on a `Fresh` attempt may move it to
/// `Refreshed`; the response of a `Refreshed` attempt is final whatever its
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAttempt {
    Fresh,
    Refreshed,
}

/// Client for the commerce API.
///
/// Cheap to clone; clones share the transport and session store.
///
/// Concurrent requests that hit a 401 at the same time each run their own
/// refresh call. There is no single-flight de-duplication.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: SharedTransport,
    session: SessionStore,
    base_url: String,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:4000/api`).
    #[must_use]
    pub fn new(transport: SharedTransport, session: SessionStore, base_url: &str) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                session,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    /// The session store consulted for credentials.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Resolve `path` against the base URL.
    ///
    /// Inputs starting with `http` are already absolute and pass unchanged;
    /// an empty path is the base itself. Exactly one `/` joins the two.
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.inner.base_url.clone();
        }
        if path.starts_with("http") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    /// Issue a request, refreshing the access token once on a 401.
    ///
    /// Any non-401 response is returned untouched, including 5xx. On a 401
    /// the refresh endpoint is called with the stored refresh token; if
    /// that yields a new access token it is persisted and the request is
    /// sent exactly once more. In every other case the original 401 is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` only when the transport produced no
    /// response at all.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(path);
        let mut token = self.inner.session.access_token();
        let mut attempt = AuthAttempt::Fresh;

        loop {
            let request = build_request(&url, &options, token.as_deref());
            let response = self.inner.transport.send(request).await?;

            match attempt {
                AuthAttempt::Refreshed => return Ok(response),
                AuthAttempt::Fresh if response.status != StatusCode::UNAUTHORIZED => {
                    return Ok(response);
                }
                AuthAttempt::Fresh => {
                    debug!(url = %url, "Request unauthorized, attempting token refresh");
                    let Some(fresh) = self.refresh_access_token().await else {
                        return Ok(response);
                    };
                    token = Some(fresh);
                    attempt = AuthAttempt::Refreshed;
                }
            }
        }
    }

    /// GET `path` and return its payload.
    ///
    /// JSON bodies are parsed (an empty object if parsing fails); other
    /// bodies come back as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the server's `message` (or
    /// `Request failed (<status>)`) for non-2xx responses, and
    /// `ApiError::Http` for transport failures.
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .request(path, RequestOptions::get())
            .await?
            .error_for_status()?;
        Ok(response.payload())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `None` (and leaves the session untouched) when there is no
    /// refresh token, the call fails, or the body carries no token.
    async fn refresh_access_token(&self) -> Option<String> {
        let Some(refresh_token) = self.inner.session.refresh_token() else {
            debug!("No refresh token stored, not refreshing");
            return None;
        };

        let request = build_request(
            &self.resolve_url(REFRESH_PATH),
            &RequestOptions::post_json(json!({ "refreshToken": refresh_token })),
            None,
        );

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.is_success() {
            warn!(status = %response.status, "Token refresh rejected");
            return None;
        }

        let access_token = response
            .json::<Value>()
            .ok()?
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let Some(access_token) = access_token else {
            warn!("Token refresh response carried no access token");
            return None;
        };

        if let Err(e) = self.inner.session.set_access_token(&access_token) {
            error!(error = %e, "Could not persist refreshed access token");
            return None;
        }

        info!("Access token refreshed");
        Some(access_token)
    }
}

/// Build the wire request: caller headers, JSON defaults for non-binary
/// bodies, and the bearer token when one is held.
fn build_request(url: &str, options: &RequestOptions, token: Option<&str>) -> ApiRequest {
    let mut headers = options.headers.clone();

    if !matches!(options.body, Some(RequestBody::Binary(_))) {
        let json = HeaderValue::from_static("application/json");
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, json.clone());
        }
        if options.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, json);
        }
    }

    if let Some(value) = token.and_then(bearer_value) {
        headers.insert(AUTHORIZATION, value);
    }

    ApiRequest {
        method: options.method.clone(),
        url: url.to_string(),
        headers,
        body: options.body.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::test_support::ScriptedTransport;
    use reqwest::Method;

    const BASE: &str = "http://localhost:4000/api";

    fn client_with(
        entries: &[(&str, &str)],
        transport: &Arc<ScriptedTransport>,
    ) -> (ApiClient, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let session = SessionStore::load(memory.clone());
        (ApiClient::new(transport.clone(), session, BASE), memory)
    }

    #[test]
    fn test_resolve_url() {
        let transport = Arc::new(ScriptedTransport::new());
        let (client, _) = client_with(&[], &transport);

        assert_eq!(client.resolve_url("/cart"), "http://localhost:4000/api/cart");
        assert_eq!(client.resolve_url("cart"), "http://localhost:4000/api/cart");
        assert_eq!(client.resolve_url(""), BASE);
        assert_eq!(
            client.resolve_url("https://cdn.example.dk/x"),
            "https://cdn.example.dk/x"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = SessionStore::load(Arc::new(MemoryStore::new()));
        let client = ApiClient::new(transport, session, "http://localhost:4000/api/");
        assert_eq!(client.resolve_url("/cart"), "http://localhost:4000/api/cart");
    }

    #[test]
    fn test_build_request_json_defaults() {
        let request = build_request(
            "http://x/cart",
            &RequestOptions::post_json(json!({"productId": 1})),
            Some("tok"),
        );
        assert_eq!(request.headers[ACCEPT], "application/json");
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_build_request_get_has_no_content_type() {
        let request = build_request("http://x/cart", &RequestOptions::get(), None);
        assert_eq!(request.headers[ACCEPT], "application/json");
        assert!(!request.headers.contains_key(CONTENT_TYPE));
        assert!(!request.headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_build_request_binary_body_gets_no_json_defaults() {
        let options = RequestOptions {
            method: Method::POST,
            headers: reqwest::header::HeaderMap::new(),
            body: Some(RequestBody::Binary(vec![1, 2, 3])),
        };
        let request = build_request("http://x/upload", &options, None);
        assert!(!request.headers.contains_key(ACCEPT));
        assert!(!request.headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_build_request_keeps_caller_headers() {
        let options = RequestOptions::post_json(json!({}))
            .with_header(ACCEPT, HeaderValue::from_static("text/plain"));
        let request = build_request("http://x/y", &options, None);
        assert_eq!(request.headers[ACCEPT], "text/plain");
    }

    #[tokio::test]
    async fn test_non_401_is_returned_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::INTERNAL_SERVER_ERROR);
        let (client, _) = client_with(&[("accessToken", "a"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_returns_original() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(StatusCode::UNAUTHORIZED, json!({"message": "expired"}));
        let (client, _) = client_with(&[("accessToken", "a")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error_message(), "expired");
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].url.ends_with(REFRESH_PATH));
    }

    #[tokio::test]
    async fn test_successful_refresh_retries_exactly_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::UNAUTHORIZED);
        transport.respond_json(StatusCode::OK, json!({"accessToken": "fresh"}));
        transport.respond_json(StatusCode::OK, json!([]));
        let (client, memory) =
            client_with(&[("accessToken", "stale"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].headers[AUTHORIZATION], "Bearer stale");
        assert_eq!(requests[1].url, "http://localhost:4000/api/auth/refresh");
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(
            requests[1].body,
            Some(RequestBody::Json(json!({"refreshToken": "r"})))
        );
        assert!(!requests[1].headers.contains_key(AUTHORIZATION));
        assert_eq!(requests[2].headers[AUTHORIZATION], "Bearer fresh");
        assert_eq!(memory.get("accessToken").as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_storage_updated_before_retry_is_sent() {
        let memory = Arc::new(MemoryStore::with_entries([
            ("accessToken", "stale"),
            ("refreshToken", "r"),
        ]));
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::UNAUTHORIZED);
        transport.respond_json(StatusCode::OK, json!({"accessToken": "fresh"}));
        transport.respond_status(StatusCode::OK);
        transport.observe_storage(memory.clone(), "accessToken");
        let session = SessionStore::load(memory.clone());
        let client = ApiClient::new(transport.clone(), session, BASE);

        client.request("/cart", RequestOptions::get()).await.unwrap();

        let seen = transport.observed();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_second_401_is_final() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::UNAUTHORIZED);
        transport.respond_json(StatusCode::OK, json!({"accessToken": "fresh"}));
        transport.respond_status(StatusCode::UNAUTHORIZED);
        let (client, _) = client_with(&[("accessToken", "a"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(StatusCode::UNAUTHORIZED, json!({"message": "original"}));
        transport.respond_status(StatusCode::FORBIDDEN);
        let (client, memory) =
            client_with(&[("accessToken", "a"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.error_message(), "original");
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(memory.get("accessToken").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_refresh_without_token_in_body_returns_original_401() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::UNAUTHORIZED);
        transport.respond_json(StatusCode::OK, json!({"ok": true}));
        let (client, _) = client_with(&[("accessToken", "a"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_transport_error_returns_original_401() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_status(StatusCode::UNAUTHORIZED);
        transport.fail("connection reset");
        let (client, _) = client_with(&[("accessToken", "a"), ("refreshToken", "r")], &transport);

        let response = client.request("/cart", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("connection refused");
        let (client, _) = client_with(&[], &transport);

        let result = client.request("/cart", RequestOptions::get()).await;

        assert!(matches!(result, Err(ApiError::Http(_))));
    }

    #[tokio::test]
    async fn test_get_json_maps_error_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(StatusCode::NOT_FOUND, json!({"message": "Not here"}));
        let (client, _) = client_with(&[], &transport);

        let err = client.get_json("/products/1").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "Not here");
    }
}
