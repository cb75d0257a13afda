//! Catalog products.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Product category.
///
/// Stored by the backend as `"Vinyl"` / `"Gear"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    /// Records.
    #[default]
    Vinyl,
    /// Turntables and other equipment.
    Gear,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Self; 2] = [Self::Vinyl, Self::Gear];

    /// The name stored in the backend and shown in filters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vinyl => "Vinyl",
            Self::Gear => "Gear",
        }
    }

    /// Whether products in this category carry a SKU.
    #[must_use]
    pub const fn has_sku(&self) -> bool {
        matches!(self, Self::Vinyl)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vinyl" => Ok(Self::Vinyl),
            "gear" => Ok(Self::Gear),
            _ => Err(format!("invalid category: {s}")),
        }
    }
}

/// A listed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub category: Category,
    /// Image URLs; the first one is the cover.
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl Product {
    /// The cover image, if any.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Errors that can occur when building a [`NewProduct`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// Name is missing.
    #[error("product name is required")]
    EmptyName,
    /// No image URL was given.
    #[error("at least one image URL is required")]
    NoImages,
}

/// A product that has not been stored yet.
///
/// Construction enforces the listing rules: a non-empty name, at least one
/// image, and a SKU only for vinyl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProduct {
    name: String,
    price: Price,
    category: Category,
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
}

impl NewProduct {
    /// Build a new product.
    ///
    /// Text fields are trimmed, blank image URLs are dropped, blank
    /// description and SKU become absent, and the SKU is discarded for
    /// categories without one.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::EmptyName` or `ProductError::NoImages`.
    pub fn new(
        name: &str,
        price: Price,
        category: Category,
        images: impl IntoIterator<Item = String>,
        description: Option<&str>,
        sku: Option<&str>,
    ) -> Result<Self, ProductError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProductError::EmptyName);
        }

        let images: Vec<String> = images
            .into_iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();
        if images.is_empty() {
            return Err(ProductError::NoImages);
        }

        let sku = if category.has_sku() {
            non_blank(sku)
        } else {
            None
        };

        Ok(Self {
            name: name.to_owned(),
            price,
            category,
            images,
            description: non_blank(description),
            sku,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn price(&self) -> Price {
        self.price
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn images(&self) -> &[String] {
        &self.images
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    /// Attach the identifier assigned by the store.
    #[must_use]
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category: self.category,
            images: self.images,
            description: self.description,
            sku: self.sku,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price() -> Price {
        "24.99".parse().unwrap()
    }

    #[test]
    fn test_category_from_str_is_case_insensitive() {
        assert_eq!("vinyl".parse::<Category>().unwrap(), Category::Vinyl);
        assert_eq!(" GEAR ".parse::<Category>().unwrap(), Category::Gear);
        assert!("cassette".parse::<Category>().is_err());
    }

    #[test]
    fn test_new_product_keeps_sku_for_vinyl() {
        let product = NewProduct::new(
            "Blue Train",
            price(),
            Category::Vinyl,
            vec!["https://img/1.jpg".to_owned()],
            None,
            Some("DV-2024-001"),
        )
        .unwrap();
        assert_eq!(product.sku(), Some("DV-2024-001"));
    }

    #[test]
    fn test_new_product_drops_sku_for_gear() {
        let product = NewProduct::new(
            "AT-LP120",
            price(),
            Category::Gear,
            vec!["https://img/1.jpg".to_owned()],
            Some("Direct drive"),
            Some("DV-2024-001"),
        )
        .unwrap();
        assert_eq!(product.sku(), None);

        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("sku").is_none());
    }

    #[test]
    fn test_new_product_filters_blank_images() {
        let product = NewProduct::new(
            "Kind of Blue",
            price(),
            Category::Vinyl,
            vec![
                " https://img/1.jpg ".to_owned(),
                String::new(),
                "https://img/2.jpg".to_owned(),
            ],
            Some("   "),
            Some(""),
        )
        .unwrap();
        assert_eq!(product.images(), ["https://img/1.jpg", "https://img/2.jpg"]);
        assert_eq!(product.description(), None);
        assert_eq!(product.sku(), None);
    }

    #[test]
    fn test_new_product_requires_name_and_image() {
        assert_eq!(
            NewProduct::new(" ", price(), Category::Vinyl, vec!["u".to_owned()], None, None),
            Err(ProductError::EmptyName)
        );
        assert_eq!(
            NewProduct::new("A", price(), Category::Vinyl, vec![String::new()], None, None),
            Err(ProductError::NoImages)
        );
    }

    #[test]
    fn test_product_deserializes_without_optional_fields() {
        let json = r#"{"id":1,"name":"Turntable","price":"199.00","category":"Gear","images":["a.jpg"]}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.category, Category::Gear);
        assert_eq!(product.cover_image(), Some("a.jpg"));
        assert!(product.sku.is_none());
    }
}
