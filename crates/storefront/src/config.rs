//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `SGTPREPPER_API_BASE_URL` - Commerce API base URL (default: `http://localhost:{port}/api`)
//! - `SGTPREPPER_API_PORT` - API port used when no base URL is given (default: 4000)
//! - `SGTPREPPER_STORAGE_PATH` - Durable storage file (default: `.sgtprepper/storage.json`)
//! - `SGTPREPPER_PLACEHOLDER_IMAGE` - Image shown when a product has none
//!   (default: `/images/placeholder.png`)
//! - `SGTPREPPER_PRODUCT_CACHE_TTL_SECS` - Product lookup memo lifetime (default: 300)
//! - `GA_MEASUREMENT_ID` - Google Analytics 4 measurement ID (falls back to `GA_ID`)
//! - `GA_API_SECRET` - GA4 Measurement Protocol API secret
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_PORT: u16 = 4000;
const DEFAULT_STORAGE_PATH: &str = ".sgtprepper/storage.json";
const DEFAULT_PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce API configuration
    pub api: ApiConfig,
    /// Durable key-value storage file
    pub storage_path: PathBuf,
    /// Placeholder image for products without one (relative or absolute)
    pub placeholder_image: String,
    /// How long product lookups stay memoised
    pub product_cache_ttl: Duration,
    /// Analytics configuration
    pub analytics: AnalyticsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Commerce API location.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every relative request path is joined under (ends in `/api`)
    pub base_url: Url,
}

/// Analytics configuration.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone, Default)]
pub struct AnalyticsConfig {
    /// Google Analytics 4 measurement ID
    pub measurement_id: Option<String>,
    /// Measurement Protocol API secret
    pub api_secret: Option<SecretString>,
}

impl std::fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("measurement_id", &self.measurement_id)
            .field(
                "api_secret",
                &self.api_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig::from_env()?;
        let storage_path = PathBuf::from(get_env_or_default(
            "SGTPREPPER_STORAGE_PATH",
            DEFAULT_STORAGE_PATH,
        ));
        let placeholder_image =
            get_env_or_default("SGTPREPPER_PLACEHOLDER_IMAGE", DEFAULT_PLACEHOLDER_IMAGE);
        let ttl_secs = get_optional_env("SGTPREPPER_PRODUCT_CACHE_TTL_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SGTPREPPER_PRODUCT_CACHE_TTL_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_PRODUCT_CACHE_TTL_SECS);

        Ok(Self {
            api,
            storage_path,
            placeholder_image,
            product_cache_ttl: Duration::from_secs(ttl_secs),
            analytics: AnalyticsConfig::from_env(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Configuration pointing at `base_url` with every other value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute URL.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig {
                base_url: parse_base_url("SGTPREPPER_API_BASE_URL", base_url)?,
            },
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
            analytics: AnalyticsConfig::default(),
            sentry_dsn: None,
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        if let Some(raw) = get_optional_env("SGTPREPPER_API_BASE_URL") {
            return Ok(Self {
                base_url: parse_base_url("SGTPREPPER_API_BASE_URL", &raw)?,
            });
        }

        let port = get_env_or_default("SGTPREPPER_API_PORT", &DEFAULT_API_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SGTPREPPER_API_PORT".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url: parse_base_url(
                "SGTPREPPER_API_PORT",
                &format!("http://localhost:{port}/api"),
            )?,
        })
    }

    /// The base URL as a string without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Origin that serves static files: the API base with a trailing `/api`
    /// segment removed.
    #[must_use]
    pub fn static_base(&self) -> &str {
        let base = self.base();
        base.strip_suffix("/api").unwrap_or(base)
    }
}

impl AnalyticsConfig {
    fn from_env() -> Self {
        Self {
            measurement_id: get_optional_env("GA_MEASUREMENT_ID")
                .or_else(|| get_optional_env("GA_ID")),
            api_secret: get_optional_env("GA_API_SECRET").map(SecretString::from),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an absolute HTTP(S) base URL.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}
