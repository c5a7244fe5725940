//! Commerce API access.
//!
//! # Architecture
//!
//! - [`Transport`] is the seam between request logic and the network;
//!   [`ReqwestTransport`] is the production implementation
//! - [`ApiClient`] resolves paths against the configured base URL, attaches
//!   the bearer token from the session store and refreshes an expired
//!   access token once per request
//! - The commerce API is the source of truth; nothing here caches responses
//!   (product memoisation lives in the lookup service)
//!
//! # Example
//!
//! ```rust,ignore
//! use sgtprepper_storefront::api::{ApiClient, RequestOptions};
//!
//! let response = client.request("/cart", RequestOptions::get()).await?;
//! if response.is_success() {
//!     let items = response.json()?;
//! }
//! ```

mod client;
mod request;
mod transport;

pub use client::{ApiClient, AuthAttempt, REFRESH_PATH};
pub use request::{ApiRequest, ApiResponse, RequestBody, RequestOptions};
pub use transport::{ReqwestTransport, SharedTransport, Transport};

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, TLS...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL {0}")]
    Url(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl ApiError {
    /// HTTP status for `Status` errors.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_displays_message_only() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Product not found".to_string(),
        };
        assert_eq!(err.to_string(), "Product not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_http_error_display() {
        let err = ApiError::Http("connection refused".to_string());
        assert_eq!(err.to_string(), "HTTP error: connection refused");
        assert_eq!(err.status(), None);
    }
}
