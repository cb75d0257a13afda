//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart manager over the visitor's store
//! - `identity` - Sign up, sign in, sign out and the admin role check
//! - `checkout` - Gateway and finalization
//! - `inventory` - Admin product form
//! - `capture` - Newsletter signups and contact messages

pub mod capture;
pub mod cart;
pub mod checkout;
pub mod identity;
pub mod inventory;

pub use capture::{CaptureError, ContactForm};
pub use cart::{CartManager, CartServiceError};
pub use checkout::{CheckoutError, CheckoutFlow, Destination, PlacedOrder, ShippingForm};
pub use identity::{AuthError, IdentityResolver, Registration};
pub use inventory::{InventoryError, ProductForm};
