//! Remote Data Service clients.
//!
//! All persistence lives behind two traits:
//!
//! - [`DataService`] - table-like resources (`products`, `orders`,
//!   `profiles`, `newsletter`, `contact_messages`)
//! - [`AuthProvider`] - sign up, sign in, sign out, session lookup
//!
//! [`Backend`] combines both and is what the rest of the crate holds as
//! `Arc<dyn Backend>`.
//!
//! # Implementations
//!
//! - [`RestBackend`] talks to a Supabase-compatible service (`PostgREST`
//!   under `/rest/v1`, `GoTrue` under `/auth/v1`) and caches the product
//!   listing with `moka`.
//! - [`MemoryBackend`] keeps everything in process memory. It is used when
//!   no remote service is configured and throughout the tests.

#[cfg(test)]
pub mod failing;
mod memory;
mod rest;
mod types;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use district_vinyl_core::{Email, NewProduct, Order, Product, ProductId, UserId, UserRole};

/// Errors returned by Remote Data Service calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an unexpected status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A unique constraint was violated (duplicate email, order number, ...).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Email/password pair was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The caller's token was rejected or lacks permission.
    #[error("unauthorized")]
    Unauthorized,

    /// Sign-up succeeded but no session was issued (email confirmation pending).
    #[error("no session issued")]
    NoSession,

    /// Failure inside the in-memory store.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BackendError {
    /// Whether this error is a unique constraint violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Table-like resources of the Remote Data Service.
///
/// Calls that act on behalf of a signed-in user take their access token so
/// row-level policies apply; `None` uses the service key.
#[async_trait]
pub trait DataService: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, BackendError>;

    /// A single product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError>;

    /// Store a new product and return it with its assigned id.
    async fn insert_product(
        &self,
        product: &NewProduct,
        token: Option<&AccessToken>,
    ) -> Result<Product, BackendError>;

    /// Store an order.
    ///
    /// Returns `BackendError::Conflict` if the order number is taken.
    async fn insert_order(
        &self,
        order: &Order,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError>;

    /// Orders owned by a user, newest first.
    async fn orders_for_user(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Vec<Order>, BackendError>;

    /// Profile row for a user.
    async fn get_profile(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Option<Profile>, BackendError>;

    /// Create or replace a profile row.
    async fn upsert_profile(
        &self,
        profile: &Profile,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError>;

    /// Change the role of the profile with this email.
    ///
    /// Returns `false` if no profile matched.
    async fn set_profile_role(&self, email: &Email, role: UserRole) -> Result<bool, BackendError>;

    /// Add an email to the newsletter list.
    ///
    /// Returns `BackendError::Conflict` if it is already subscribed.
    async fn subscribe_newsletter(&self, email: &Email) -> Result<(), BackendError>;

    /// Store a contact form submission.
    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BackendError>;

    /// Check that the service is reachable.
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Authentication service of the Remote Data Service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and open a session for it.
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthSession, BackendError>;

    /// Open a session with email and password.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError>;

    /// Revoke a session token.
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError>;

    /// Resolve a token to its user, or `None` if it is no longer valid.
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError>;
}

/// Everything the storefront needs from the Remote Data Service.
pub trait Backend: DataService + AuthProvider {}

impl<T: DataService + AuthProvider> Backend for T {}
