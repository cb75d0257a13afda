//! Memory backend whose writes can be made to fail.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use district_vinyl_core::{Email, NewProduct, Order, Product, ProductId, UserId, UserRole};

use super::{
    AccessToken, AuthProvider, AuthSession, AuthUser, BackendError, ContactMessage, DataService,
    MemoryBackend, Profile, SignUpMetadata,
};

/// Wraps a [`MemoryBackend`]. Each queued error is returned by one write
/// before the wrapped backend is reached again.
#[derive(Default)]
pub struct FailingWrites {
    inner: MemoryBackend,
    order_failures: Mutex<VecDeque<BackendError>>,
    product_failures: Mutex<VecDeque<BackendError>>,
    order_calls: AtomicUsize,
}

impl FailingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next order inserts with these errors, in order.
    pub fn fail_orders(self, errors: impl IntoIterator<Item = BackendError>) -> Self {
        self.order_failures.lock().unwrap().extend(errors);
        self
    }

    /// Fail the next product inserts with these errors, in order.
    pub fn fail_products(self, errors: impl IntoIterator<Item = BackendError>) -> Self {
        self.product_failures.lock().unwrap().extend(errors);
        self
    }

    /// How many order inserts were attempted.
    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub const fn inner(&self) -> &MemoryBackend {
        &self.inner
    }
}

/// A conflict on the order number.
pub fn order_number_taken() -> BackendError {
    BackendError::Conflict("duplicate key value violates unique constraint".to_string())
}

/// A server-side failure.
pub fn service_down() -> BackendError {
    BackendError::Api {
        status: 500,
        message: "internal server error".to_string(),
    }
}

#[async_trait]
impl DataService for FailingWrites {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.inner.list_products().await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        self.inner.get_product(id).await
    }

    async fn insert_product(
        &self,
        product: &NewProduct,
        token: Option<&AccessToken>,
    ) -> Result<Product, BackendError> {
        let failure = self.product_failures.lock().unwrap().pop_front();
        match failure {
            Some(e) => Err(e),
            None => self.inner.insert_product(product, token).await,
        }
    }

    async fn insert_order(
        &self,
        order: &Order,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.order_failures.lock().unwrap().pop_front();
        match failure {
            Some(e) => Err(e),
            None => self.inner.insert_order(order, token).await,
        }
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Vec<Order>, BackendError> {
        self.inner.orders_for_user(user_id, token).await
    }

    async fn get_profile(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Option<Profile>, BackendError> {
        self.inner.get_profile(user_id, token).await
    }

    async fn upsert_profile(
        &self,
        profile: &Profile,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        self.inner.upsert_profile(profile, token).await
    }

    async fn set_profile_role(&self, email: &Email, role: UserRole) -> Result<bool, BackendError> {
        self.inner.set_profile_role(email, role).await
    }

    async fn subscribe_newsletter(&self, email: &Email) -> Result<(), BackendError> {
        self.inner.subscribe_newsletter(email).await
    }

    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BackendError> {
        self.inner.insert_contact_message(message).await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.inner.ping().await
    }
}

#[async_trait]
impl AuthProvider for FailingWrites {
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthSession, BackendError> {
        self.inner.sign_up(email, password, metadata).await
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError> {
        self.inner.sign_out(token).await
    }

    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError> {
        self.inner.get_user(token).await
    }
}
