//! Storefront context: one instance of every service, wired together.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ApiClient, ReqwestTransport, SharedTransport};
use crate::config::StorefrontConfig;
use crate::error::StorefrontError;
use crate::image::ImageResolver;
use crate::services::analytics::{
    Analytics, ConsentStore, MeasurementProtocolTracker, SharedTracker,
};
use crate::services::auth::SessionStore;
use crate::services::cart::CartState;
use crate::services::categories::CategoryState;
use crate::services::lookup::ProductLookup;
use crate::storage::{FileStore, SharedStore};

/// Everything a storefront front end needs.
///
/// This struct is cheaply cloneable via `Arc`. Every service inside shares
/// the same session store and API client, so a token refreshed by one
/// service is seen by all of them.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    storage: SharedStore,
    session: SessionStore,
    api: ApiClient,
    images: ImageResolver,
    lookup: ProductLookup,
    cart: CartState,
    categories: CategoryState,
    analytics: Analytics,
}

impl Storefront {
    /// Wire the services over explicit backends.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `storage` - Durable key-value store for the session and consent
    /// * `transport` - HTTP transport for the commerce API
    /// * `tracker` - Analytics backend; `None` disables analytics
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        storage: SharedStore,
        transport: SharedTransport,
        tracker: Option<SharedTracker>,
    ) -> Self {
        let session = SessionStore::load(storage.clone());
        let api = ApiClient::new(transport, session.clone(), config.api.base());
        let images = ImageResolver::new(config.api.static_base(), &config.placeholder_image);
        let lookup = ProductLookup::new(api.clone(), config.product_cache_ttl);
        let cart = CartState::new(api.clone(), lookup.clone(), images.clone());
        let categories = CategoryState::new(api.clone());
        let analytics = Analytics::new(
            ConsentStore::new(storage.clone()),
            config.analytics.measurement_id.clone(),
            tracker,
        );

        debug!(base_url = %config.api.base(), "Storefront services wired");

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                storage,
                session,
                api,
                images,
                lookup,
                cart,
                categories,
                analytics,
            }),
        }
    }

    /// Wire the production backends: a file store at
    /// `config.storage_path`, the `reqwest` transport, and the Measurement
    /// Protocol tracker when both a measurement id and API secret are set.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Storage` if the storage file cannot be
    /// opened.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, StorefrontError> {
        let storage: SharedStore = Arc::new(FileStore::open(&config.storage_path)?);
        let transport: SharedTransport = Arc::new(ReqwestTransport::new());

        let tracker = match (
            &config.analytics.measurement_id,
            &config.analytics.api_secret,
        ) {
            (Some(measurement_id), Some(api_secret)) => {
                let tracker: SharedTracker = Arc::new(MeasurementProtocolTracker::new(
                    measurement_id,
                    api_secret.clone(),
                    storage.clone(),
                ));
                Some(tracker)
            }
            _ => None,
        };

        info!(
            storage = %config.storage_path.display(),
            analytics = tracker.is_some(),
            "Storefront initialised"
        );

        Ok(Self::new(config, storage, transport, tracker))
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &SharedStore {
        &self.inner.storage
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn images(&self) -> &ImageResolver {
        &self.inner.images
    }

    #[must_use]
    pub fn lookup(&self) -> &ProductLookup {
        &self.inner.lookup
    }

    #[must_use]
    pub fn cart(&self) -> &CartState {
        &self.inner.cart
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryState {
        &self.inner.categories
    }

    #[must_use]
    pub fn analytics(&self) -> &Analytics {
        &self.inner.analytics
    }
}
