//! Order history dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use district_vinyl_core::{Order, Price};

use crate::backend::{BackendError, DataService};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAuth, SIGN_IN_PATH};
use crate::routes::{Nav, placed_order_banner};
use crate::services::IdentityResolver;
use crate::state::AppState;

/// One line of an order, for templates.
#[derive(Clone, Debug)]
pub struct OrderLineView {
    pub name: String,
    pub quantity: u32,
    pub line_price: String,
}

/// Order display data for templates.
#[derive(Clone, Debug)]
pub struct OrderView {
    pub order_number: String,
    pub placed_on: String,
    pub status: &'static str,
    pub item_count: u32,
    pub lines: Vec<OrderLineView>,
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub ship_to: String,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number.to_string(),
            placed_on: order.created_at.format("%d.%m.%Y").to_string(),
            status: order.status.as_str(),
            item_count: order.item_count(),
            lines: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    name: item.product.name.clone(),
                    quantity: item.quantity,
                    line_price: item.line_total().display(),
                })
                .collect(),
            subtotal: order.subtotal.display(),
            shipping: order.shipping_fee.display(),
            total: order.total_amount.display(),
            ship_to: format!("{}, {}, {}", order.address, order.city, order.country),
        }
    }
}

/// Dashboard query parameters.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Order number just placed, shown as a confirmation banner.
    pub order: Option<String>,
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub nav: Nav,
    pub full_name: String,
    pub email: String,
    pub orders: Vec<OrderView>,
    pub collection_value: String,
    pub placed_order: Option<String>,
}

/// Sum of order totals.
#[must_use]
pub fn collection_value(orders: &[Order]) -> Price {
    orders.iter().map(|order| order.total_amount).sum()
}

/// Display the signed-in visitor's orders, newest first.
///
/// An expired access token ends the session and sends the visitor to the
/// sign-in page.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<DashboardQuery>,
) -> Result<Response> {
    let identity = IdentityResolver::new(state.backend(), &session);
    let token = identity.access_token().await?;

    let orders = match state
        .backend()
        .orders_for_user(user.id, token.as_ref())
        .await
    {
        Ok(orders) => orders,
        Err(BackendError::Unauthorized) => {
            tracing::info!("Access token rejected; signing out");
            identity.logout().await?;
            return Ok(Redirect::to(SIGN_IN_PATH).into_response());
        }
        Err(e) => return Err(AppError::from(e)),
    };

    Ok(DashboardTemplate {
        nav: Nav::new(Some(&user)),
        full_name: user.full_name.clone(),
        email: user.email.to_string(),
        collection_value: collection_value(&orders).display(),
        orders: orders.iter().map(OrderView::from).collect(),
        placed_order: placed_order_banner(query.order),
    }
    .into_response())
}
