//! Subcommand implementations.

pub mod cart;
pub mod consent;
pub mod product;
pub mod session;

use sgtprepper_storefront::StorefrontError;
use sgtprepper_storefront::api::ApiError;
use sgtprepper_storefront::services::auth::AuthError;
use sgtprepper_storefront::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// A JSON argument could not be parsed.
    #[error("Invalid JSON argument: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Some cart lines could not be removed.
    #[error("{failed} cart line(s) could not be removed")]
    PartialClear { failed: usize },

    /// The category list could not be loaded.
    #[error("{0}")]
    Categories(String),
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        Self::Storefront(err.into())
    }
}

/// Print a JSON value, pretty.
fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
