//! Sgt. Prepper Core - Shared types library.
//!
//! This crate provides common types used across the storefront client:
//! - `storefront` - API client, session, cart and product lookup services
//! - `cli` - Command-line front end for the storefront services
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, locale-tolerant prices, slugs, consent records
//!   and durable storage key names

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
