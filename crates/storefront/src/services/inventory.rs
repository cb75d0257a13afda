//! Admin inventory form.

use thiserror::Error;

use district_vinyl_core::{Category, NewProduct, Price, PriceError, Product, ProductError};

use crate::backend::{AccessToken, Backend, BackendError, DataService};

/// Errors from the inventory form.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Name, price or image left blank.
    #[error("name, price and at least one image are required")]
    MissingFields,

    /// Price is not a positive decimal.
    #[error("invalid price: {0}")]
    InvalidPrice(#[from] PriceError),

    /// Unknown category.
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    /// The product failed the listing rules.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// The product could not be written.
    #[error("failed to save product: {0}")]
    Write(#[from] BackendError),
}

impl InventoryError {
    /// Message shown inline on the form.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingFields | Self::Product(_) => {
                "PLEASE FILL NAME, PRICE, AND AT LEAST ONE IMAGE"
            }
            Self::InvalidPrice(_) => "PRICE MUST BE A POSITIVE NUMBER",
            Self::InvalidCategory(_) => "PLEASE SELECT VINYL OR GEAR",
            Self::Write(_) => "COULD NOT SAVE THE PRODUCT, PLEASE TRY AGAIN",
        }
    }
}

/// The inventory form as submitted.
///
/// Image URLs come one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: String,
}

impl ProductForm {
    /// The non-blank image URLs, trimmed, in the order given.
    #[must_use]
    pub fn image_urls(&self) -> Vec<String> {
        self.images
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate into a product ready to be stored.
    ///
    /// The SKU is dropped for categories that have none, whatever was typed.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields`, `InvalidPrice` or `InvalidCategory`.
    pub fn validate(&self) -> Result<NewProduct, InventoryError> {
        let images = self.image_urls();
        if self.name.trim().is_empty() || self.price.trim().is_empty() || images.is_empty() {
            return Err(InventoryError::MissingFields);
        }

        let price = Price::parse_positive(&self.price)?;
        let category: Category = self
            .category
            .parse()
            .map_err(InventoryError::InvalidCategory)?;

        Ok(NewProduct::new(
            &self.name,
            price,
            category,
            images,
            Some(self.description.as_str()),
            Some(self.sku.as_str()),
        )?)
    }
}

/// Validate the form and write the product.
///
/// # Errors
///
/// Returns a validation `InventoryError`, or `InventoryError::Write` if the
/// backend rejects the insert.
#[tracing::instrument(skip(backend, token, form), fields(category = %form.category))]
pub async fn create_product(
    backend: &dyn Backend,
    token: Option<&AccessToken>,
    form: &ProductForm,
) -> Result<Product, InventoryError> {
    let new_product = form.validate()?;
    let product = backend.insert_product(&new_product, token).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "Product listed");
    Ok(product)
}
