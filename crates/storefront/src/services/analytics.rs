//! Consent-driven analytics.
//!
//! Nothing is sent until the visitor has granted analytics consent and
//! [`Analytics::init`] has run. Events go to a pluggable [`Tracker`]; the
//! production backend is the GA4 Measurement Protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use sgtprepper_core::{Consent, CurrencyCode, parse_price, storage_keys};

use crate::storage::{SharedStore, StorageError};

/// GA4 Measurement Protocol collection endpoint.
const COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";

/// Errors raised by a tracker backend.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The client id could not be stored.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The collector endpoint is not a valid URL.
    #[error("Invalid collector endpoint: {0}")]
    Endpoint(String),

    /// The collector rejected the hit.
    #[error("Collector error: {status} - {message}")]
    Collector { status: u16, message: String },
}

// =============================================================================
// Consent
// =============================================================================

/// Reads and writes the persisted consent record.
#[derive(Clone)]
pub struct ConsentStore {
    storage: SharedStore,
}

impl ConsentStore {
    #[must_use]
    pub fn new(storage: SharedStore) -> Self {
        Self { storage }
    }

    /// The stored record. Missing or unreadable records are `None`.
    #[must_use]
    pub fn get_consent(&self) -> Option<Consent> {
        let raw = self.storage.get(storage_keys::COOKIE_CONSENT)?;
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<Option<Consent>>(&raw) {
            Ok(consent) => consent,
            Err(e) => {
                debug!(error = %e, "Stored consent is not readable, ignoring");
                None
            }
        }
    }

    /// Merge `partial` over the stored record, stamp it and persist it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record could not be written.
    pub fn set_consent(&self, partial: &Consent) -> Result<Consent, StorageError> {
        let next = self
            .get_consent()
            .unwrap_or_default()
            .merge(partial, Utc::now());
        self.storage
            .set(storage_keys::COOKIE_CONSENT, &serde_json::to_string(&next)?)?;
        info!(
            analytics = ?next.analytics,
            marketing = ?next.marketing,
            all = ?next.all,
            "Consent updated"
        );
        Ok(next)
    }
}

// =============================================================================
// Tracker backends
// =============================================================================

/// Something the analytics shim hands to a tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    /// Tracker configuration, sent once by [`Analytics::init`].
    Config {
        measurement_id: String,
        anonymize_ip: bool,
    },
    /// A named event with its parameters.
    Event { name: String, params: Value },
}

impl AnalyticsEvent {
    fn event(name: &str, params: Value) -> Self {
        Self::Event {
            name: name.to_string(),
            params,
        }
    }
}

/// Analytics backend.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError` if delivery failed. Callers log and drop it.
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Shared handle to a tracker backend.
pub type SharedTracker = Arc<dyn Tracker>;

/// GA4 Measurement Protocol backend.
///
/// The pseudonymous client id is read from storage on the first hit, or
/// generated and stored then.
#[derive(Clone)]
pub struct MeasurementProtocolTracker {
    client: reqwest::Client,
    measurement_id: String,
    api_secret: SecretString,
    storage: SharedStore,
    cached_client_id: Arc<Mutex<Option<String>>>,
    endpoint: String,
}

impl MeasurementProtocolTracker {
    #[must_use]
    pub fn new(measurement_id: &str, api_secret: SecretString, storage: SharedStore) -> Self {
        Self {
            client: reqwest::Client::new(),
            measurement_id: measurement_id.to_string(),
            api_secret,
            storage,
            cached_client_id: Arc::new(Mutex::new(None)),
            endpoint: COLLECT_URL.to_string(),
        }
    }

    /// Send hits somewhere other than the public collector.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn client_id(&self) -> Result<String, StorageError> {
        let mut cached = self.cached_client_id.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let id = match self
            .storage
            .get(storage_keys::ANALYTICS_CLIENT_ID)
            .filter(|id| !id.is_empty())
        {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                self.storage.set(storage_keys::ANALYTICS_CLIENT_ID, &id)?;
                debug!("Generated analytics client id");
                id
            }
        };
        *cached = Some(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl Tracker for MeasurementProtocolTracker {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let AnalyticsEvent::Event { name, params } = event else {
            // No config call in the Measurement Protocol.
            debug!("Measurement Protocol tracker configured");
            return Ok(());
        };

        let body = json!({
            "client_id": self.client_id()?,
            "events": [{ "name": name, "params": params }],
        });

        let url = url::Url::parse_with_params(
            &self.endpoint,
            [
                ("measurement_id", self.measurement_id.as_str()),
                ("api_secret", self.api_secret.expose_secret()),
            ],
        )
        .map_err(|e| AnalyticsError::Endpoint(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Collector {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Tracker that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Tracker for RecordingTracker {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

// =============================================================================
// Analytics shim
// =============================================================================

/// A page view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageView {
    /// Path plus query string.
    pub path: String,
    pub title: String,
    /// Full URL.
    pub location: String,
}

/// Consent-gated analytics for one storefront context.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<AnalyticsInner>,
}

struct AnalyticsInner {
    consent: ConsentStore,
    measurement_id: Option<String>,
    tracker: Option<SharedTracker>,
    initialized: AtomicBool,
}

impl Analytics {
    #[must_use]
    pub fn new(
        consent: ConsentStore,
        measurement_id: Option<String>,
        tracker: Option<SharedTracker>,
    ) -> Self {
        Self {
            inner: Arc::new(AnalyticsInner {
                consent,
                measurement_id: measurement_id.filter(|id| !id.is_empty()),
                tracker,
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// The consent store this shim reads.
    #[must_use]
    pub fn consent(&self) -> &ConsentStore {
        &self.inner.consent
    }

    /// Whether [`Self::init`] has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Initialise if the stored consent allows analytics.
    pub async fn init_from_stored_consent(&self) -> bool {
        match self.inner.consent.get_consent() {
            Some(consent) if consent.allows_analytics() => self.init().await,
            _ => {
                debug!("No analytics consent, not initialising");
                false
            }
        }
    }

    /// Configure the tracker. Runs at most once; later calls are no-ops.
    ///
    /// Returns whether analytics is initialised afterwards. Without a
    /// measurement id or tracker backend nothing happens.
    #[instrument(skip(self))]
    pub async fn init(&self) -> bool {
        let (Some(measurement_id), Some(tracker)) =
            (&self.inner.measurement_id, &self.inner.tracker)
        else {
            debug!("No measurement id or tracker configured, analytics disabled");
            return false;
        };

        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return true;
        }

        let config = AnalyticsEvent::Config {
            measurement_id: measurement_id.clone(),
            anonymize_ip: true,
        };
        if let Err(e) = tracker.send(&config).await {
            warn!(error = %e, "Failed to configure tracker");
        }
        info!(measurement_id = %measurement_id, "Analytics initialised");
        true
    }

    /// Record a page view. No-op until initialised.
    pub async fn track_page_view(&self, page: &PageView) {
        let params = json!({
            "page_title": page.title,
            "page_location": page.location,
            "page_path": page.path,
        });
        self.emit(AnalyticsEvent::event("page_view", params)).await;
    }

    /// Record an add-to-cart. No-op until initialised or when `product` is
    /// `null`. A zero quantity counts as one.
    pub async fn track_add_to_cart(&self, product: &Value, quantity: u32) {
        if product.is_null() {
            return;
        }
        self.emit(add_to_cart_event(product, quantity)).await;
    }

    async fn emit(&self, event: AnalyticsEvent) {
        if !self.is_initialized() {
            return;
        }
        let Some(tracker) = &self.inner.tracker else {
            return;
        };
        if let Err(e) = tracker.send(&event).await {
            warn!(error = %e, "Failed to send analytics event");
        }
    }
}

fn add_to_cart_event(product: &Value, quantity: u32) -> AnalyticsEvent {
    let quantity = quantity.max(1);
    let price = product
        .get("price")
        .map(parse_price)
        .unwrap_or_default();
    let value = price.saturating_mul(Decimal::from(quantity));

    let item_id = ["id", "slug", "name"]
        .iter()
        .find_map(|key| product.get(*key).and_then(scalar_string))
        .unwrap_or_else(|| "unknown".to_string());
    let item_name = ["name", "slug"]
        .iter()
        .find_map(|key| product.get(*key).and_then(scalar_string))
        .unwrap_or_else(|| "Produkt".to_string());

    AnalyticsEvent::event(
        "add_to_cart",
        json!({
            "currency": CurrencyCode::DKK.code(),
            "value": value.to_f64().unwrap_or_default(),
            "items": [{
                "item_id": item_id,
                "item_name": item_name,
                "quantity": quantity,
                "price": price.to_f64().unwrap_or_default(),
            }],
        }),
    )
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
