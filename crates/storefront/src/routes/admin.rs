//! Admin inventory route handlers.
//!
//! Every request re-checks the admin role against the profile store. A
//! visitor who is anonymous or not an admin only ever sees the login prompt,
//! and a signed-in non-admin is signed out.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use district_vinyl_core::{Category, Product};

use crate::backend::DataService;
use crate::error::AppError;
use crate::filters;
use crate::models::CurrentUser;
use crate::routes::{CategoryOption, Nav};
use crate::routes::auth::LoginForm;
use crate::routes::shop::ProductView;
use crate::services::inventory::{self, InventoryError, ProductForm};
use crate::services::{AuthError, IdentityResolver};
use crate::state::AppState;

const ADMIN_PATH: &str = "/admin";

/// Login prompt shown instead of the form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/login.html")]
pub struct AdminLoginTemplate {
    pub nav: Nav,
    pub email: String,
    pub error: Option<String>,
}

/// Inventory form and current listing.
#[derive(Template, WebTemplate)]
#[template(path = "admin/form.html")]
pub struct AdminFormTemplate {
    pub nav: Nav,
    pub admin_name: String,
    pub form: ProductForm,
    pub categories: Vec<CategoryOption>,
    pub products: Vec<ProductView>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl AdminFormTemplate {
    fn new(admin: &CurrentUser, form: ProductForm, products: &[Product]) -> Self {
        Self {
            nav: Nav::new(Some(admin)),
            admin_name: admin.full_name.clone(),
            categories: CategoryOption::list(&form.category, false),
            form,
            products: products.iter().map(ProductView::from).collect(),
            error: None,
            success: None,
        }
    }
}

/// A blank form with the first category selected.
fn blank_form() -> ProductForm {
    ProductForm {
        category: Category::Vinyl.as_str().to_string(),
        ..ProductForm::default()
    }
}

/// Message shown after a product is listed.
#[must_use]
pub fn success_message(category: Category) -> String {
    format!("{} ADDED SUCCESSFULLY!", category.as_str().to_uppercase())
}

/// Put `product` first, dropping any stale copy further down.
#[must_use]
pub fn prepend_product(mut products: Vec<Product>, product: Product) -> Vec<Product> {
    products.retain(|p| p.id != product.id);
    products.insert(0, product);
    products
}

/// Status for a rejected product: 503 when the write failed, 422 for
/// anything the admin can correct.
const fn failure_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::Write(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn login_prompt(email: String, error: Option<String>) -> AdminLoginTemplate {
    AdminLoginTemplate {
        nav: Nav::default(),
        email,
        error,
    }
}

/// Resolve the admin, or the response to send instead.
async fn require_admin(
    identity: &IdentityResolver<'_>,
) -> std::result::Result<CurrentUser, Response> {
    match identity.require_admin().await {
        Ok(admin) => Ok(admin),
        Err(AuthError::NotAuthenticated) => {
            Err(login_prompt(String::new(), None).into_response())
        }
        Err(e @ AuthError::NotAdmin) => {
            tracing::warn!("Non-admin reached the inventory form; signed out");
            let message = e.user_message().map(String::from);
            Err((StatusCode::FORBIDDEN, login_prompt(String::new(), message)).into_response())
        }
        Err(e) => Err(AppError::from(e).into_response()),
    }
}

/// Display the inventory form, or the login prompt.
#[instrument(skip(state, session))]
pub async fn index(State(state): State<AppState>, session: Session) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);
    let admin = match require_admin(&identity).await {
        Ok(admin) => admin,
        Err(response) => return response,
    };

    match state.backend().list_products().await {
        Ok(products) => AdminFormTemplate::new(&admin, blank_form(), &products).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Sign in from the admin prompt. The role is checked straight away.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);

    let result = match identity.login(&form.email, &form.password).await {
        Ok(_) => identity.require_admin().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(admin) => {
            tracing::info!(user_id = %admin.id, "Admin signed in");
            Redirect::to(ADMIN_PATH).into_response()
        }
        Err(e) => match e.user_message() {
            Some(message) => {
                let status = if matches!(e, AuthError::NotAdmin) {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (status, login_prompt(form.email, Some(message.to_string()))).into_response()
            }
            None => AppError::from(e).into_response(),
        },
    }
}

/// Create a product from the inventory form.
///
/// On success the form is cleared and the new product heads the listing.
/// On failure the typed values are kept.
#[instrument(skip(state, session, form))]
pub async fn create_product(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ProductForm>,
) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);
    let admin = match require_admin(&identity).await {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    let token = match identity.access_token().await {
        Ok(token) => token,
        Err(e) => return AppError::from(e).into_response(),
    };

    let created = inventory::create_product(state.backend(), token.as_ref(), &form).await;
    let products = match state.backend().list_products().await {
        Ok(products) => products,
        Err(e) => return AppError::from(e).into_response(),
    };

    match created {
        Ok(product) => {
            let success = success_message(product.category);
            let products = prepend_product(products, product);
            AdminFormTemplate {
                success: Some(success),
                ..AdminFormTemplate::new(&admin, blank_form(), &products)
            }
            .into_response()
        }
        Err(e) => {
            if let InventoryError::Write(ref source) = e {
                tracing::error!(error = %source, "Failed to save product");
            }
            let status = failure_status(&e);
            let message = e.user_message().to_string();
            (
                status,
                AdminFormTemplate {
                    error: Some(message),
                    ..AdminFormTemplate::new(&admin, form, &products)
                },
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::ProductId;

    use super::*;
    use crate::backend::failing::{FailingWrites, service_down};

    fn product(id: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Record {id}"),
            price: "10.00".parse().unwrap(),
            category: Category::Vinyl,
            images: vec![format!("https://img/{id}.jpg")],
            description: None,
            sku: None,
        }
    }

    #[test]
    fn test_success_message() {
        assert_eq!(success_message(Category::Vinyl), "VINYL ADDED SUCCESSFULLY!");
        assert_eq!(success_message(Category::Gear), "GEAR ADDED SUCCESSFULLY!");
    }

    #[test]
    fn test_prepend_product_without_duplicates() {
        let listing = vec![product(3), product(2), product(1)];
        let ids: Vec<i64> = prepend_product(listing, product(2))
            .iter()
            .map(|p| p.id.as_i64())
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let ids: Vec<i64> = prepend_product(vec![product(1)], product(9))
            .iter()
            .map(|p| p.id.as_i64())
            .collect();
        assert_eq!(ids, vec![9, 1]);
    }

    #[tokio::test]
    async fn test_failed_product_write_is_unavailable() {
        let backend = FailingWrites::new().fail_products([service_down()]);
        let form = ProductForm {
            name: "Blue Train".to_string(),
            price: "27.50".to_string(),
            category: "Vinyl".to_string(),
            images: "https://img.example/blue-train.jpg".to_string(),
            ..ProductForm::default()
        };

        let err = inventory::create_product(&backend, None, &form)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Write(_)));
        assert_eq!(failure_status(&err), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            err.user_message(),
            "COULD NOT SAVE THE PRODUCT, PLEASE TRY AGAIN"
        );
        assert!(backend.list_products().await.unwrap().is_empty());

        let product = inventory::create_product(&backend, None, &form).await.unwrap();
        assert_eq!(product.name, "Blue Train");
    }

    #[test]
    fn test_validation_failure_is_unprocessable() {
        assert_eq!(
            failure_status(&InventoryError::MissingFields),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_blank_form_selects_vinyl() {
        assert_eq!(blank_form().category, "Vinyl");
        assert!(blank_form().images.is_empty());
    }
}
