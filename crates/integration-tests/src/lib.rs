//! Integration tests for District Vinyl.
//!
//! Each test spawns the full storefront router on an ephemeral port, backed
//! by a fresh [`MemoryBackend`], and drives it over HTTP with a cookie-keeping
//! `reqwest` client that does not follow redirects.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p district-vinyl-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use district_vinyl_core::{Category, Email, NewProduct, Price, Product};
use district_vinyl_storefront::backend::{Backend, BackendError, MemoryBackend};
use district_vinyl_storefront::build_app;
use district_vinyl_storefront::config::StorefrontConfig;
use district_vinyl_storefront::state::AppState;
use reqwest::{Client, Response, header::LOCATION, redirect::Policy};

/// Admin account created in every test app.
pub const ADMIN_EMAIL: &str = "owner@districtvinyl.test";
/// Password of [`ADMIN_EMAIL`].
pub const ADMIN_PASSWORD: &str = "needle-drop";

/// A running storefront.
pub struct TestApp {
    pub base_url: String,
    pub backend: Arc<MemoryBackend>,
    pub client: Client,
}

impl TestApp {
    /// Start a storefront with an empty catalog and one admin account.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the client built.
    pub async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let backend = Arc::new(MemoryBackend::new());
        backend.create_admin(&Email::parse(ADMIN_EMAIL)?, ADMIN_PASSWORD, "Shop Owner")?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let shared: Arc<dyn Backend> = backend.clone();
        let app = build_app(AppState::new(StorefrontConfig::local(&base_url), shared));
        tokio::spawn(async move {
            // The server lives as long as the test runtime.
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            backend,
            client: Self::client()?,
        })
    }

    /// A new visitor: its own cookie jar, redirects not followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn client() -> reqwest::Result<Client> {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the price or product is invalid.
    pub fn seed(
        &self,
        name: &str,
        price: &str,
        category: Category,
    ) -> Result<Product, Box<dyn std::error::Error>> {
        let product = NewProduct::new(
            name,
            price.parse::<Price>()?,
            category,
            vec![format!("https://img.example/{}.jpg", name.len())],
            None,
            Some("DV-TEST"),
        )?;
        Ok(self.backend.seed_product(product)?)
    }

    /// GET with the app's visitor.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.url(path)).send().await
    }

    /// Form POST with the app's visitor.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Result<Response> {
        self.client.post(self.url(path)).form(form).send().await
    }

    /// Form POST as an HTMX request.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn htmx_post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Result<Response> {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
    }

    /// Add `quantity` of `product` to the visitor's cart.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn add_to_cart(&self, product: &Product, quantity: u32) -> reqwest::Result<Response> {
        let id = product.id.to_string();
        let quantity = quantity.to_string();
        self.post("/cart/add", &[("product_id", &id), ("quantity", &quantity)])
            .await
    }

    /// Submit the shipping form with valid details.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn submit_shipping(&self) -> reqwest::Result<Response> {
        self.post(
            "/checkout/final",
            &[
                ("full_name", "Ana Petrovska"),
                ("phone", "+389 70 123 456"),
                ("address", "Shirok Sokak 12"),
                ("city", "Bitola"),
                ("country", "North Macedonia"),
                ("email", ""),
            ],
        )
        .await
    }

    /// Orders written so far.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Internal` if the store lock is poisoned.
    pub fn orders(&self) -> Result<Vec<district_vinyl_core::Order>, BackendError> {
        self.backend.orders()
    }
}

/// The `Location` header of a redirect, or `""`.
#[must_use]
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
