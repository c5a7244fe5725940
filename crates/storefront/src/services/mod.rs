//! Storefront services.
//!
//! # Services
//!
//! - `auth` - Token/session store backed by durable storage
//! - `lookup` - Memoised product lookup across the API's product paths
//! - `cart` - Server-owned cart, enriched with products and images
//! - `categories` - Category list
//! - `analytics` - Consent-gated analytics with pluggable trackers

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod lookup;
