//! Unified error type for callers that drive several services.
//!
//! Each service returns its own error enum; `StorefrontError` wraps them so
//! a front end can use one `Result` type and `?` across service calls.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::services::analytics::AnalyticsError;
use crate::services::auth::AuthError;
use crate::storage::StorageError;

/// Error type spanning every storefront service.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Commerce API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Session could not be updated.
    #[error("Session error: {0}")]
    Auth(#[from] AuthError),

    /// Analytics backend failed.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Caller input was rejected before any request was made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorefrontError {
    /// Whether this error points at local state (config, disk) rather
    /// than the remote API or the caller's input.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Storage(_) | Self::Auth(_))
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;
