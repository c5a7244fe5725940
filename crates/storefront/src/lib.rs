//! Sgt. Prepper storefront client library.
//!
//! Client-side services for the Sgt. Prepper commerce API: an
//! authenticated fetch wrapper that refreshes expired tokens, a persisted
//! session store, product image resolution, product lookup, cart state,
//! categories, and consent-gated analytics. [`Storefront`] wires one
//! instance of each.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod image;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use error::StorefrontError;
pub use state::Storefront;
