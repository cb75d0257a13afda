//! Storefront models.

pub mod session;

pub use session::{CheckoutStage, CurrentUser, keys as session_keys};
