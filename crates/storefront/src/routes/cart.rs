//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart itself lives in the visitor's session. Plain form posts (no
//! `HX-Request` header) get a redirect back to the cart instead of a
//! fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use district_vinyl_core::{CartItem, OrderTotals, ProductId, ShippingPolicy};

use crate::backend::DataService;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::{Nav, is_htmx};
use crate::services::CartManager;
use crate::state::AppState;

/// Event HTMX listens for to refresh the count badge.
const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Cart item display data for templates.
#[derive(Clone, Debug)]
pub struct CartItemView {
    pub product_id: i64,
    pub name: String,
    pub category: &'static str,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product.id.as_i64(),
            name: item.product.name.clone(),
            category: item.product.category.as_str(),
            image: item.product.cover_image().map(String::from),
            quantity: item.quantity,
            price: item.product.price.display(),
            line_price: item.line_total().display(),
        }
    }
}

/// Cart display data for templates.
///
/// Shipping and total are projected with the shipping policy; the same
/// figures are charged at checkout.
#[derive(Clone, Debug)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub free_shipping: bool,
    pub free_threshold: String,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &CartManager<'_>, policy: &ShippingPolicy) -> Self {
        let totals = OrderTotals::compute(cart.cart(), policy);
        Self {
            items: cart.cart().items().iter().map(CartItemView::from).collect(),
            item_count: cart.item_count(),
            subtotal: totals.subtotal.display(),
            shipping: totals.shipping.display(),
            total: totals.total.display(),
            free_shipping: totals.shipping.is_zero(),
            free_threshold: policy.free_threshold.display(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i64,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i64,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i64,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub nav: Nav,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display cart page.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let cart = CartManager::load(&session).await?;

    Ok(CartShowTemplate {
        nav: Nav::new(user.as_ref()),
        cart: CartView::new(&cart, state.shipping()),
    })
}

/// Add item to cart.
///
/// Adding a product already in the cart increases its quantity. Returns the
/// count badge with an HTMX trigger to update other elements.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id);
    let product = state
        .backend()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let quantity = form.quantity.unwrap_or(1);
    let mut cart = CartManager::load(&session).await?;
    add_breadcrumb(
        "cart",
        "Added to cart",
        &[
            ("product_id", id.to_string()),
            ("quantity", quantity.to_string()),
        ],
    );
    cart.add(product, quantity).await?;

    if !is_htmx(&headers) {
        return Ok(Redirect::to("/cart").into_response());
    }

    Ok((
        AppendHeaders([CART_UPDATED_TRIGGER]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response())
}

/// Update cart item quantity.
///
/// Quantities below one leave the item as it was; removal is explicit.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart = CartManager::load(&session).await?;
    cart.update_quantity(ProductId::new(form.product_id), form.quantity)
        .await?;

    Ok(items_response(&headers, &cart, state.shipping()))
}

/// Remove item from cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = CartManager::load(&session).await?;
    add_breadcrumb(
        "cart",
        "Removed from cart",
        &[("product_id", form.product_id.to_string())],
    );
    cart.remove(ProductId::new(form.product_id)).await?;

    Ok(items_response(&headers, &cart, state.shipping()))
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<impl IntoResponse> {
    let cart = CartManager::load(&session).await?;
    Ok(CartCountTemplate {
        count: cart.item_count(),
    })
}

fn items_response(headers: &HeaderMap, cart: &CartManager<'_>, policy: &ShippingPolicy) -> Response {
    if !is_htmx(headers) {
        return Redirect::to("/cart").into_response();
    }

    (
        AppendHeaders([CART_UPDATED_TRIGGER]),
        CartItemsTemplate {
            cart: CartView::new(cart, policy),
        },
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::{Category, Price, Product};

    use super::*;
    use crate::store::MemoryStore;

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Record {id}"),
            price: price.parse().unwrap(),
            category: Category::Vinyl,
            images: vec![format!("https://img/{id}.jpg")],
            description: None,
            sku: None,
        }
    }

    fn policy() -> ShippingPolicy {
        ShippingPolicy::new(
            Price::from_cents(5000).unwrap(),
            Price::from_cents(500).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_cart_view_projects_shipping() {
        let store = MemoryStore::new();
        let mut cart = CartManager::load(&store).await.unwrap();
        cart.add(product(1, "15.00"), 2).await.unwrap();

        let view = CartView::new(&cart, &policy());
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "€30.00");
        assert_eq!(view.shipping, "€5.00");
        assert_eq!(view.total, "€35.00");
        assert!(!view.free_shipping);
        assert_eq!(view.items[0].line_price, "€30.00");
    }

    #[tokio::test]
    async fn test_cart_view_free_shipping_above_threshold() {
        let store = MemoryStore::new();
        let mut cart = CartManager::load(&store).await.unwrap();
        cart.add(product(1, "55.00"), 1).await.unwrap();

        let view = CartView::new(&cart, &policy());
        assert!(view.free_shipping);
        assert_eq!(view.total, "€55.00");
    }

    #[tokio::test]
    async fn test_cart_view_exact_threshold_pays_shipping() {
        let store = MemoryStore::new();
        let mut cart = CartManager::load(&store).await.unwrap();
        cart.add(product(1, "50.00"), 1).await.unwrap();

        let view = CartView::new(&cart, &policy());
        assert!(!view.free_shipping);
        assert_eq!(view.total, "€55.00");
    }

    #[tokio::test]
    async fn test_items_response_redirects_without_htmx() {
        let store = MemoryStore::new();
        let cart = CartManager::load(&store).await.unwrap();

        let plain = items_response(&HeaderMap::new(), &cart, &policy());
        assert_eq!(plain.status(), axum::http::StatusCode::SEE_OTHER);

        let mut headers = HeaderMap::new();
        headers.insert("HX-Request", "true".parse().unwrap());
        let fragment = items_response(&headers, &cart, &policy());
        assert_eq!(fragment.status(), axum::http::StatusCode::OK);
        assert_eq!(fragment.headers().get("HX-Trigger").unwrap(), "cart-updated");
    }
}
