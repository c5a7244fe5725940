//! HTTP transport seam.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::ApiError;
use super::request::{ApiRequest, ApiResponse, RequestBody};

/// Sends one request and buffers the response.
///
/// Implementations must not retry, follow auth flows or interpret status
/// codes; every response (including 4xx/5xx) is returned as `Ok`. `Err` is
/// reserved for requests that never got an answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn Transport>;

/// Production transport backed by `reqwest`.
///
/// No timeout is configured: a stalled call stalls its operation.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client (custom TLS, proxies...).
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "Sending API request");

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.body(value.to_string()),
            Some(RequestBody::Binary(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status = %status, bytes = body.len(), "API response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
