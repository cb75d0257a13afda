//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Shop listing
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (pings the backend)
//!
//! # Shop
//! GET  /shop                   - Product listing (?category=All|Vinyl|Gear)
//! GET  /shop/{id}              - Product detail
//!
//! # Cart (HTMX fragments, redirects without HTMX)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove item (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout               - Gateway
//! POST /checkout/login         - Gateway: sign in
//! POST /checkout/register      - Gateway: register
//! POST /checkout/guest         - Gateway: continue as guest
//! POST /checkout/continue      - Gateway: continue signed in
//! GET  /checkout/final         - Shipping form
//! POST /checkout/final         - Place order
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Account (requires auth)
//! GET  /dashboard              - Order history
//!
//! # Admin (requires admin role)
//! GET  /admin                  - Inventory form or login prompt
//! POST /admin/login            - Role-checked login
//! POST /admin/products         - Create product
//!
//! # Capture
//! GET  /contact                - Contact form
//! POST /contact                - Send message
//! POST /newsletter             - Newsletter signup (fragment)
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod dashboard;
pub mod health;
pub mod newsletter;
pub mod shop;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};

use district_vinyl_core::Category;

use crate::models::CurrentUser;
use crate::state::AppState;

/// Header set by HTMX on every request it issues.
pub const HX_REQUEST_HEADER: &str = "HX-Request";

/// Whether the request came from HTMX rather than a plain form post.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST_HEADER)
        .is_some_and(|value| value == "true")
}

/// The `?order=` value for the order-placed banner, kept only when it is an
/// order number.
#[must_use]
pub fn placed_order_banner(order: Option<String>) -> Option<String> {
    order.filter(|order| !order.is_empty() && order.chars().all(|c| c.is_ascii_digit()))
}

/// Navigation data shared by every page layout.
#[derive(Clone, Debug, Default)]
pub struct Nav {
    pub user_name: Option<String>,
    pub is_admin: bool,
}

impl Nav {
    #[must_use]
    pub fn new(user: Option<&CurrentUser>) -> Self {
        Self {
            user_name: user.map(|u| u.full_name.clone()),
            is_admin: user.is_some_and(|u| u.role.is_admin()),
        }
    }
}

/// A category choice in a filter bar or select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryOption {
    pub name: &'static str,
    pub selected: bool,
}

impl CategoryOption {
    /// Every category, marking the one matching `selected` (any case).
    /// With `include_all`, an "All" entry comes first.
    #[must_use]
    pub fn list(selected: &str, include_all: bool) -> Vec<Self> {
        include_all
            .then_some("All")
            .into_iter()
            .chain(Category::ALL.iter().map(Category::as_str))
            .map(|name| Self {
                name,
                selected: name.eq_ignore_ascii_case(selected.trim()),
            })
            .collect()
    }
}

/// Create the shop routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shop::index))
        .route("/{id}", get(shop::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::gateway))
        .route("/login", post(checkout::login))
        .route("/register", post(checkout::register))
        .route("/guest", post(checkout::guest))
        .route("/continue", post(checkout::continue_signed_in))
        .route("/final", get(checkout::final_page).post(checkout::place_order))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::index))
        .route("/login", post(admin::login))
        .route("/products", post(admin::create_product))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shop::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/shop", shop_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .route("/dashboard", get(dashboard::index))
        .nest("/admin", admin_routes())
        .route("/contact", get(contact::page).post(contact::submit))
        .route("/newsletter", post(newsletter::subscribe))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert(HX_REQUEST_HEADER, "true".parse().unwrap());
        assert!(is_htmx(&headers));
    }

    #[test]
    fn test_category_options() {
        let options = CategoryOption::list("gear", true);
        let names: Vec<&str> = options.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["All", "Vinyl", "Gear"]);
        assert!(options.iter().filter(|o| o.selected).all(|o| o.name == "Gear"));

        assert_eq!(CategoryOption::list("Vinyl", false).len(), 2);
    }

    #[test]
    fn test_placed_order_banner_accepts_only_digits() {
        assert_eq!(
            placed_order_banner(Some("482913".to_string())).as_deref(),
            Some("482913")
        );
        assert!(placed_order_banner(Some("<script>".to_string())).is_none());
        assert!(placed_order_banner(Some("12a".to_string())).is_none());
        assert!(placed_order_banner(Some(String::new())).is_none());
        assert!(placed_order_banner(None).is_none());
    }
}
