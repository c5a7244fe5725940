//! Session store error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while mutating the session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The session could not be persisted.
    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),

    /// The user profile could not be serialised for storage.
    #[error("failed to serialize user profile: {0}")]
    Serialize(#[from] serde_json::Error),
}
