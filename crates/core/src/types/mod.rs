//! Core types for District Vinyl.
//!
//! This module provides type-safe wrappers for the shop's domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use cart::{Cart, CartError, CartItem};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderTotals, ShippingDetails};
pub use price::{Price, PriceError, ShippingPolicy};
pub use product::{Category, NewProduct, Product, ProductError};
pub use status::*;
