//! Category list.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::ApiClient;

/// Shown when the category list cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "Kunne ikke hente kategorier.";

#[derive(Debug, Default)]
struct CategorySnapshot {
    categories: Vec<Value>,
    loading: bool,
    error: Option<String>,
}

/// Shared category list for one storefront context.
#[derive(Clone)]
pub struct CategoryState {
    inner: Arc<CategoryStateInner>,
}

struct CategoryStateInner {
    api: ApiClient,
    state: RwLock<CategorySnapshot>,
}

impl CategoryState {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CategoryStateInner {
                api,
                state: RwLock::new(CategorySnapshot::default()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CategorySnapshot> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CategorySnapshot> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `/categories`, replacing the current list.
    ///
    /// A body that is not an array yields an empty list. Any failure sets
    /// [`LOAD_FAILED_MESSAGE`] and keeps the previous list.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.inner.api.get_json("/categories").await;

        let mut state = self.write();
        state.loading = false;
        match result {
            Ok(Value::Array(categories)) => {
                debug!(count = categories.len(), "Categories loaded");
                state.categories = categories;
            }
            Ok(_) => {
                debug!("Category body is not an array, treating as empty");
                state.categories = Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to load categories");
                state.error = Some(LOAD_FAILED_MESSAGE.to_string());
            }
        }
    }

    /// Load only if the list is empty and no load is running.
    pub async fn ensure_loaded(&self) {
        let needed = {
            let state = self.read();
            state.categories.is_empty() && !state.loading
        };
        if needed {
            self.load().await;
        }
    }

    #[must_use]
    pub fn categories(&self) -> Vec<Value> {
        self.read().categories.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}
