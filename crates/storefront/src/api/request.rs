//! Request and response values passed through a [`Transport`](super::Transport).

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialised as JSON; gets JSON `Accept`/`Content-Type` defaults.
    Json(Value),
    /// Sent verbatim (uploads, multipart payloads). The caller owns every
    /// header; no JSON defaults are applied.
    Binary(Vec<u8>),
}

/// What the caller wants sent, before URL resolution and auth.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get()
        }
    }

    #[must_use]
    pub fn post_json(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(RequestBody::Json(body)),
        }
    }

    /// Add or replace a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// A fully resolved request, ready for the wire.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Response with a JSON body, mostly for fakes and tests.
    #[must_use]
    pub fn json_body(status: StatusCode, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: body.to_string().into_bytes(),
        }
    }

    /// Response with an empty body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the server labelled the body as JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Deserialize the body.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body as a loosely-typed payload.
    ///
    /// JSON responses are parsed (an empty object when parsing fails); any
    /// other content type becomes a JSON string.
    #[must_use]
    pub fn payload(&self) -> Value {
        if self.is_json() {
            self.json().unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
        } else {
            Value::String(self.text())
        }
    }

    /// Turn a non-2xx response into `ApiError::Status`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` carrying [`Self::error_message`] when the
    /// status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                message: self.error_message(),
            })
        }
    }

    /// Human-readable failure message: the server's `message` field if it
    /// sent one, otherwise `Request failed (<status>)`.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.json::<Value>()
            .ok()
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map_or_else(
                || format!("Request failed ({})", self.status.as_u16()),
                str::to_string,
            )
    }
}
