//! Token/session store.
//!
//! Holds the access token, refresh token and signed-in user profile for one
//! storefront context. Every clone of [`SessionStore`] shares the same
//! state. The store is loaded from durable storage on construction and
//! written back on every mutation, so the in-memory and persisted copies
//! never disagree.

mod error;

pub use error::AuthError;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, warn};

use sgtprepper_core::storage_keys;

use crate::storage::SharedStore;

/// Tokens handed out by the login or refresh endpoints.
///
/// `None` and empty strings both mean "no token".
#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }
}

/// In-memory session snapshot.
#[derive(Debug, Clone, Default)]
pub struct Session {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    user: Option<Value>,
}

impl Session {
    /// Read whatever is currently persisted.
    fn read_from(storage: &SharedStore) -> Self {
        let user = storage
            .get(storage_keys::AUTH_USER)
            .and_then(|raw| match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Stored user profile is not valid JSON, ignoring");
                    None
                }
            })
            .filter(|v| !v.is_null());

        Self {
            access_token: non_empty(storage.get(storage_keys::ACCESS_TOKEN))
                .map(SecretString::from),
            refresh_token: non_empty(storage.get(storage_keys::REFRESH_TOKEN))
                .map(SecretString::from),
            user,
        }
    }
}

/// Process-wide (per context) session state backed by durable storage.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: SharedStore,
    state: RwLock<Session>,
}

impl SessionStore {
    /// Load the session from `storage`.
    ///
    /// A stored user profile that is not valid JSON is treated as absent.
    #[must_use]
    pub fn load(storage: SharedStore) -> Self {
        let session = Session::read_from(&storage);

        debug!(
            has_access_token = session.access_token.is_some(),
            has_refresh_token = session.refresh_token.is_some(),
            "Session loaded from storage"
        );

        Self {
            inner: Arc::new(SessionStoreInner {
                storage,
                state: RwLock::new(session),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole session.
    ///
    /// Absent fields are cleared and their storage keys removed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if storage rejects a write. Keys written before
    /// the failure stay written and the in-memory copy is reloaded from
    /// storage, so both still agree.
    pub fn set_session(&self, tokens: SessionTokens, user: Option<Value>) -> Result<(), AuthError> {
        let access_token = non_empty(tokens.access_token);
        let refresh_token = non_empty(tokens.refresh_token);
        let user = user.filter(|u| !u.is_null());

        let mut state = self.write();

        let storage = &self.inner.storage;
        let written = persist_optional(storage, storage_keys::ACCESS_TOKEN, access_token.as_deref())
            .and_then(|()| {
                persist_optional(storage, storage_keys::REFRESH_TOKEN, refresh_token.as_deref())
            })
            .and_then(|()| match &user {
                Some(profile) => storage
                    .set(storage_keys::AUTH_USER, &serde_json::to_string(profile)?)
                    .map_err(AuthError::from),
                None => storage.remove(storage_keys::AUTH_USER).map_err(AuthError::from),
            });

        if let Err(e) = written {
            warn!(error = %e, "Session write failed, reloading from storage");
            *state = Session::read_from(storage);
            return Err(e);
        }

        info!(
            authenticated = access_token.is_some(),
            has_user = user.is_some(),
            "Session updated"
        );

        *state = Session {
            access_token: access_token.map(SecretString::from),
            refresh_token: refresh_token.map(SecretString::from),
            user,
        };
        Ok(())
    }

    /// Log out: clear every field and its storage key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if storage rejects the removal.
    pub fn clear_session(&self) -> Result<(), AuthError> {
        self.set_session(SessionTokens::default(), None)
    }

    /// Replace only the access token (after a refresh).
    ///
    /// Storage is written before this returns.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if storage rejects the write.
    pub fn set_access_token(&self, token: &str) -> Result<(), AuthError> {
        let token = non_empty(Some(token.to_string()));
        let storage = &self.inner.storage;
        let mut state = self.write();
        if let Err(e) = persist_optional(storage, storage_keys::ACCESS_TOKEN, token.as_deref()) {
            *state = Session::read_from(storage);
            return Err(e);
        }
        state.access_token = token.map(SecretString::from);
        Ok(())
    }

    /// `Authorization: Bearer <token>` when signed in, otherwise empty.
    #[must_use]
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.access_token().as_deref().and_then(bearer_value) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read()
            .access_token
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read()
            .refresh_token
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    /// Signed-in user profile, as the API returned it.
    #[must_use]
    pub fn user(&self) -> Option<Value> {
        self.read().user.clone()
    }

    /// Whether an access token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().access_token.is_some()
    }
}

/// Build a sensitive bearer header value.
pub(crate) fn bearer_value(token: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            warn!("Access token contains characters not allowed in a header, not sending it");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn persist_optional(
    storage: &SharedStore,
    key: &str,
    value: Option<&str>,
) -> Result<(), AuthError> {
    match value {
        Some(v) => storage.set(key, v)?,
        None => storage.remove(key)?,
    }
    Ok(())
}
