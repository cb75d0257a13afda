//! Two-step checkout.
//!
//! The gateway settles who is buying (sign in, register, or guest) and
//! records that in the visitor's store. Finalization is only reachable
//! after that, collects shipping details and writes the order.

use chrono::Utc;
use rand::Rng;
use thiserror::Error;

use district_vinyl_core::{
    Email, EmailError, Order, OrderNumber, OrderTotals, ShippingDetails, ShippingPolicy,
};

use crate::backend::{Backend, BackendError, DataService};
use crate::models::{CheckoutStage, CurrentUser, session_keys};
use crate::services::cart::CartManager;
use crate::services::identity::{AuthError, IdentityResolver, Registration};
use crate::store::{KeyValueStore, KeyValueStoreExt, StoreError};

/// How many order numbers are tried before giving up on collisions.
pub const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// Finalization was requested before the gateway was passed.
    #[error("checkout gateway not passed")]
    GatewayRequired,

    /// A required shipping field is blank.
    #[error("missing shipping field: {0}")]
    MissingShippingField(&'static str),

    /// The contact email is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Gateway sign-in or registration failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The order could not be written.
    #[error("order submission failed: {0}")]
    Submission(#[source] BackendError),

    /// Session store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Message shown inline on the checkout page, or `None` for server-side
    /// failures.
    #[must_use]
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::EmptyCart => Some("YOUR CART IS EMPTY"),
            Self::GatewayRequired => Some("PLEASE CHOOSE HOW TO CHECK OUT"),
            Self::MissingShippingField(_) => Some("PLEASE FILL IN ALL SHIPPING FIELDS"),
            Self::InvalidEmail(_) => Some("PLEASE ENTER A VALID EMAIL ADDRESS"),
            Self::Submission(_) => {
                Some("WE COULD NOT PLACE YOUR ORDER. YOUR CART IS SAVED, PLEASE TRY AGAIN")
            }
            Self::Auth(e) => e.user_message(),
            Self::Store(_) => None,
        }
    }
}

/// Shipping form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub email: String,
}

impl ShippingForm {
    /// The form as first shown: identity details filled in and the default
    /// city and country.
    #[must_use]
    pub fn prefilled(user: Option<&CurrentUser>) -> Self {
        Self {
            full_name: user.map(|u| u.full_name.clone()).unwrap_or_default(),
            phone: user.and_then(|u| u.phone.clone()).unwrap_or_default(),
            address: String::new(),
            city: ShippingDetails::DEFAULT_CITY.to_string(),
            country: ShippingDetails::DEFAULT_COUNTRY.to_string(),
            email: user.map(|u| u.email.to_string()).unwrap_or_default(),
        }
    }

    /// Validate into shipping details.
    ///
    /// Every field but the email is required. A signed-in buyer who leaves
    /// the email blank gets their account email.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingShippingField` or
    /// `CheckoutError::InvalidEmail`.
    pub fn validate(&self, user: Option<&CurrentUser>) -> Result<ShippingDetails, CheckoutError> {
        let required = [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("country", &self.country),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CheckoutError::MissingShippingField(*field));
        }

        let email = match self.email.trim() {
            "" => user.map(|u| u.email.clone()),
            raw => Some(Email::parse(raw)?),
        };

        Ok(ShippingDetails {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            country: self.country.trim().to_string(),
            email,
        })
    }
}

/// Where the buyer goes after placing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Order history, for signed-in buyers.
    Dashboard,
    /// The shop, for guests.
    Home,
}

impl Destination {
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Home => "/",
        }
    }
}

/// A successfully written order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub destination: Destination,
}

/// Checkout flow for one visitor.
pub struct CheckoutFlow<'a> {
    backend: &'a dyn Backend,
    store: &'a dyn KeyValueStore,
    policy: &'a ShippingPolicy,
}

impl<'a> CheckoutFlow<'a> {
    #[must_use]
    pub const fn new(
        backend: &'a dyn Backend,
        store: &'a dyn KeyValueStore,
        policy: &'a ShippingPolicy,
    ) -> Self {
        Self {
            backend,
            store,
            policy,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> IdentityResolver<'a> {
        IdentityResolver::new(self.backend, self.store)
    }

    /// The cart, provided it has something in it.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart.
    pub async fn require_cart(&self) -> Result<CartManager<'a>, CheckoutError> {
        let cart = CartManager::load(self.store).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(cart)
    }

    /// Whether the gateway has been passed in this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn gateway_passed(&self) -> Result<bool, StoreError> {
        match self.store.get::<CheckoutStage>(session_keys::CHECKOUT_STAGE).await {
            Ok(stage) => Ok(stage == Some(CheckoutStage::Finalization)),
            Err(StoreError::Decode { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Gateway: sign in, then move to finalization.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Auth` if sign-in fails; the stage is left
    /// unchanged.
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, CheckoutError> {
        self.require_cart().await?;
        let user = self.identity().login(email, password).await?;
        self.pass_gateway().await?;
        Ok(user)
    }

    /// Gateway: register (name and phone required), then move to
    /// finalization.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Auth` if registration fails; the stage is
    /// left unchanged.
    pub async fn register(&self, input: &Registration) -> Result<CurrentUser, CheckoutError> {
        self.require_cart().await?;
        let user = self.identity().register(input, true).await?;
        self.pass_gateway().await?;
        Ok(user)
    }

    /// Gateway: drop any signed-in identity and continue as a guest.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or a store error.
    pub async fn continue_as_guest(&self) -> Result<(), CheckoutError> {
        self.require_cart().await?;
        self.identity().logout().await?;
        self.pass_gateway().await?;
        tracing::debug!("Continuing checkout as guest");
        Ok(())
    }

    /// Gateway: continue with the identity already signed in.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Auth(AuthError::NotAuthenticated)` for an
    /// anonymous visitor.
    pub async fn continue_signed_in(&self) -> Result<CurrentUser, CheckoutError> {
        self.require_cart().await?;
        let user = self
            .identity()
            .current()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        self.pass_gateway().await?;
        Ok(user)
    }

    /// Check that finalization may be shown, returning the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::GatewayRequired`.
    pub async fn finalization(&self) -> Result<CartManager<'a>, CheckoutError> {
        let cart = self.require_cart().await?;
        if !self.gateway_passed().await? {
            return Err(CheckoutError::GatewayRequired);
        }
        Ok(cart)
    }

    /// Totals for the current cart.
    #[must_use]
    pub fn totals(&self, cart: &CartManager<'_>) -> OrderTotals {
        OrderTotals::compute(cart.cart(), self.policy)
    }

    /// Finalization: validate shipping, write the order and clear the cart.
    ///
    /// A colliding order number is regenerated. On failure the cart and the
    /// stage are left as they were.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `GatewayRequired`, a shipping validation error,
    /// or `CheckoutError::Submission` if the order cannot be written.
    pub async fn place_order(&self, form: &ShippingForm) -> Result<PlacedOrder, CheckoutError> {
        let mut cart = self.finalization().await?;
        let identity = self.identity();
        let user = identity.current().await?;
        let shipping = form.validate(user.as_ref())?;
        let token = identity.access_token().await?;
        let user_id = user.as_ref().map(|u| u.id);

        let mut attempt = 0;
        let order = loop {
            attempt += 1;
            let order = Order::place(
                generate_order_number(),
                user_id,
                shipping.clone(),
                cart.cart(),
                self.policy,
                Utc::now(),
            );

            match self.backend.insert_order(&order, token.as_ref()).await {
                Ok(()) => break order,
                Err(BackendError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    tracing::warn!(
                        order_number = %order.order_number,
                        attempt,
                        "Order number taken; regenerating"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to submit order");
                    return Err(CheckoutError::Submission(e));
                }
            }
        };

        cart.clear().await?;
        self.store.remove(session_keys::CHECKOUT_STAGE).await?;

        tracing::info!(
            order_number = %order.order_number,
            guest = order.is_guest(),
            total = %order.total_amount,
            "Order placed"
        );

        let destination = if order.is_guest() {
            Destination::Home
        } else {
            Destination::Dashboard
        };
        Ok(PlacedOrder { order, destination })
    }

    async fn pass_gateway(&self) -> Result<(), StoreError> {
        self.store
            .set(session_keys::CHECKOUT_STAGE, &CheckoutStage::Finalization)
            .await
    }
}

fn generate_order_number() -> OrderNumber {
    OrderNumber::from_value(rand::rng().random_range(OrderNumber::MIN..=OrderNumber::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::{Category, NewProduct, Price, Product};

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::backend::failing::{FailingWrites, order_number_taken, service_down};
    use crate::store::MemoryStore;

    fn seed(backend: &MemoryBackend, name: &str, price: &str) -> Product {
        backend
            .seed_product(
                NewProduct::new(
                    name,
                    price.parse().unwrap(),
                    Category::Vinyl,
                    vec![format!("https://img.example/{name}.jpg")],
                    None,
                    None,
                )
                .unwrap(),
            )
            .unwrap()
    }

    fn shipping_form() -> ShippingForm {
        ShippingForm {
            full_name: "Ana Petrovska".to_string(),
            phone: "+38970000000".to_string(),
            address: "Shirok Sokak 1".to_string(),
            ..ShippingForm::prefilled(None)
        }
    }

    #[test]
    fn test_prefilled_uses_defaults() {
        let form = ShippingForm::prefilled(None);
        assert_eq!(form.city, "Bitola");
        assert_eq!(form.country, "North Macedonia");
        assert!(form.full_name.is_empty());
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let form = ShippingForm {
            address: "  ".to_string(),
            ..shipping_form()
        };
        assert!(matches!(
            form.validate(None),
            Err(CheckoutError::MissingShippingField("address"))
        ));
    }

    #[tokio::test]
    async fn test_guest_order_free_shipping() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let first = seed(&backend, "a", "20.00");
        let second = seed(&backend, "b", "15.00");

        let mut cart = CartManager::load(&store).await.unwrap();
        cart.add(first, 2).await.unwrap();
        cart.add(second, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        flow.continue_as_guest().await.unwrap();
        let placed = flow.place_order(&shipping_form()).await.unwrap();

        assert!(placed.order.is_guest());
        assert_eq!(placed.order.subtotal, "55.00".parse().unwrap());
        assert_eq!(placed.order.shipping_fee, Price::ZERO);
        assert_eq!(placed.order.total_amount, "55.00".parse().unwrap());
        assert_eq!(placed.destination, Destination::Home);

        assert!(!store.contains(session_keys::CART));
        assert!(!store.contains(session_keys::CHECKOUT_STAGE));
        assert_eq!(backend.orders().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guest_order_flat_fee() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(&backend, "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        flow.continue_as_guest().await.unwrap();
        let placed = flow.place_order(&shipping_form()).await.unwrap();

        assert_eq!(placed.order.shipping_fee, "5.00".parse().unwrap());
        assert_eq!(placed.order.total_amount, "35.00".parse().unwrap());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart_and_stage() {
        let backend = FailingWrites::new().fail_orders([service_down()]);
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(backend.inner(), "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        flow.continue_as_guest().await.unwrap();
        let err = flow.place_order(&shipping_form()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Submission(BackendError::Api { status: 500, .. })
        ));
        assert!(err.user_message().unwrap().contains("YOUR CART IS SAVED"));
        assert_eq!(backend.order_calls(), 1);
        assert!(store.contains(session_keys::CART));
        assert!(flow.gateway_passed().await.unwrap());
        assert!(backend.inner().orders().unwrap().is_empty());

        // The retry goes through with the same cart.
        let placed = flow.place_order(&shipping_form()).await.unwrap();
        assert_eq!(placed.order.total_amount, "35.00".parse().unwrap());
        assert!(!store.contains(session_keys::CART));
    }

    #[tokio::test]
    async fn test_taken_order_number_is_regenerated() {
        let backend =
            FailingWrites::new().fail_orders([order_number_taken(), order_number_taken()]);
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(backend.inner(), "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        flow.continue_as_guest().await.unwrap();
        flow.place_order(&shipping_form()).await.unwrap();

        assert_eq!(backend.order_calls(), ORDER_NUMBER_ATTEMPTS);
        assert_eq!(backend.inner().orders().unwrap().len(), 1);
        assert!(!store.contains(session_keys::CART));
    }

    #[tokio::test]
    async fn test_order_number_attempts_are_bounded() {
        let backend = FailingWrites::new().fail_orders((0..5).map(|_| order_number_taken()));
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(backend.inner(), "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        flow.continue_as_guest().await.unwrap();
        let err = flow.place_order(&shipping_form()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Submission(BackendError::Conflict(_))
        ));
        assert_eq!(backend.order_calls(), ORDER_NUMBER_ATTEMPTS);
        assert!(store.contains(session_keys::CART));
        assert!(flow.gateway_passed().await.unwrap());
    }

    #[tokio::test]
    async fn test_finalization_requires_gateway() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(&backend, "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        let err = flow.place_order(&shipping_form()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::GatewayRequired));
        assert!(store.contains(session_keys::CART));
        assert!(backend.orders().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_with_empty_cart() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        assert!(matches!(
            flow.continue_as_guest().await,
            Err(CheckoutError::EmptyCart)
        ));
        assert!(!store.contains(session_keys::CHECKOUT_STAGE));
    }

    #[tokio::test]
    async fn test_registered_order_goes_to_dashboard() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(&backend, "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        let user = flow
            .register(&Registration {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
                full_name: "Ana Petrovska".to_string(),
                phone: "+38970000000".to_string(),
            })
            .await
            .unwrap();

        let form = ShippingForm {
            address: "Shirok Sokak 1".to_string(),
            ..ShippingForm::prefilled(Some(&user))
        };
        let placed = flow.place_order(&form).await.unwrap();

        assert_eq!(placed.order.user_id, Some(user.id));
        assert_eq!(placed.order.email, Some(user.email));
        assert_eq!(placed.destination, Destination::Dashboard);
    }

    #[tokio::test]
    async fn test_failed_registration_stays_at_gateway() {
        let backend = MemoryBackend::new();
        let store = MemoryStore::new();
        let policy = ShippingPolicy::default();
        let product = seed(&backend, "a", "30.00");
        CartManager::load(&store).await.unwrap().add(product, 1).await.unwrap();

        let flow = CheckoutFlow::new(&backend, &store, &policy);
        let err = flow
            .register(&Registration {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
                ..Registration::default()
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.user_message(),
            Some("NAME AND PHONE ARE REQUIRED FOR REGISTRATION")
        );
        assert!(!flow.gateway_passed().await.unwrap());
    }
}
