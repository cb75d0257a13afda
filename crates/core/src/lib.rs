//! District Vinyl Core - Shared domain types.
//!
//! This crate provides the types used across all District Vinyl components:
//! - `storefront` - Public-facing shop, checkout and admin inventory form
//! - `cli` - Command-line tools for catalog seeding and role management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no session access. The cart algebra and shipping rule live here
//! so they can be tested without a running backend.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, prices, products, carts, orders and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
