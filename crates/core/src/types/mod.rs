//! Core types for the Sgt. Prepper storefront client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod consent;
pub mod id;
pub mod price;
pub mod slug;
pub mod storage_keys;

pub use consent::Consent;
pub use id::*;
pub use price::{CurrencyCode, parse_price, parse_price_str};
pub use slug::slugify;
