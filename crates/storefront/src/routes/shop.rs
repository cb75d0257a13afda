//! Shop listing and product detail handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use district_vinyl_core::{Category, Product, ProductId};

use crate::backend::DataService;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::{CategoryOption, Nav, placed_order_banner};
use crate::state::AppState;

/// Shown when a product has no description.
pub const NO_DESCRIPTION: &str = "No specific details available.";

/// Product display data for templates.
#[derive(Clone, Debug)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub category: &'static str,
    pub cover: Option<String>,
    pub images: Vec<String>,
    pub description: String,
    pub sku: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            price: product.price.display(),
            category: product.category.as_str(),
            cover: product.cover_image().map(String::from),
            images: product.images.clone(),
            description: product
                .description
                .clone()
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            sku: product.sku.clone(),
        }
    }
}

/// Category filter on the listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Parse the `category` query value. Unknown values show everything.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse::<Category>().ok())
            .map_or(Self::All, Self::Only)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Only(category) => category.as_str(),
        }
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => product.category == *category,
        }
    }
}

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    pub category: Option<String>,
    /// Order number just placed, shown as a confirmation banner.
    pub order: Option<String>,
}

/// Shop listing template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/index.html")]
pub struct ShopIndexTemplate {
    pub nav: Nav,
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryOption>,
    pub selected: &'static str,
    pub placed_order: Option<String>,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/show.html")]
pub struct ProductShowTemplate {
    pub nav: Nav,
    pub product: ProductView,
}

/// Display the product listing, newest first.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ShopQuery>,
) -> Result<impl IntoResponse> {
    let filter = CategoryFilter::parse(query.category.as_deref());
    let products = state
        .backend()
        .list_products()
        .await?
        .iter()
        .filter(|product| filter.matches(product))
        .map(ProductView::from)
        .collect();

    Ok(ShopIndexTemplate {
        nav: Nav::new(user.as_ref()),
        products,
        categories: CategoryOption::list(filter.label(), true),
        selected: filter.label(),
        placed_order: placed_order_banner(query.order),
    })
}

/// Display a product.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let product = state
        .backend()
        .get_product(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductShowTemplate {
        nav: Nav::new(user.as_ref()),
        product: ProductView::from(&product),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::NewProduct;

    use super::*;

    fn product(category: Category) -> Product {
        NewProduct::new(
            "Blue Train",
            "24.99".parse().unwrap(),
            category,
            vec!["https://img.example/1.jpg".to_string()],
            None,
            None,
        )
        .unwrap()
        .into_product(ProductId::new(1))
    }

    #[test]
    fn test_category_filter_is_case_insensitive() {
        assert_eq!(
            CategoryFilter::parse(Some("vinyl")),
            CategoryFilter::Only(Category::Vinyl)
        );
        assert_eq!(CategoryFilter::parse(Some("All")), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(None), CategoryFilter::All);
    }

    #[test]
    fn test_category_filter_matches() {
        let gear = product(Category::Gear);
        assert!(CategoryFilter::All.matches(&gear));
        assert!(CategoryFilter::Only(Category::Gear).matches(&gear));
        assert!(!CategoryFilter::Only(Category::Vinyl).matches(&gear));
    }

    #[test]
    fn test_product_view_description_fallback() {
        let view = ProductView::from(&product(Category::Vinyl));
        assert_eq!(view.description, NO_DESCRIPTION);
        assert_eq!(view.price, "€24.99");
    }
}
