//! Checkout route handlers.
//!
//! The gateway (`/checkout`) settles who is buying; finalization
//! (`/checkout/final`) collects shipping details and places the order.
//! An empty cart sends the visitor back to `/cart`, and finalization
//! without the gateway sends them to `/checkout`.

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

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::models::CurrentUser;
use crate::routes::Nav;
use crate::routes::auth::{LoginForm, RegistrationView};
use crate::routes::cart::CartView;
use crate::services::{CheckoutError, CheckoutFlow, Registration, ShippingForm};
use crate::state::AppState;

const CART_PATH: &str = "/cart";
const GATEWAY_PATH: &str = "/checkout";
const FINAL_PATH: &str = "/checkout/final";

/// Gateway page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/gateway.html")]
pub struct GatewayTemplate {
    pub nav: Nav,
    pub cart: CartView,
    /// Name of the signed-in visitor, offered a "continue as" button.
    pub signed_in_as: Option<String>,
    pub login_email: String,
    pub registration: RegistrationView,
    pub error: Option<String>,
}

/// Finalization page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/final.html")]
pub struct FinalTemplate {
    pub nav: Nav,
    pub cart: CartView,
    pub form: ShippingForm,
    pub is_guest: bool,
    pub error: Option<String>,
}

/// Values typed into the gateway, echoed back on failure.
#[derive(Default)]
struct GatewayInput {
    login_email: String,
    registration: RegistrationView,
}

fn flow<'a>(state: &'a AppState, session: &'a Session) -> CheckoutFlow<'a> {
    CheckoutFlow::new(state.backend(), session, state.shipping())
}

/// Redirect for the two navigation failures, `None` for everything else.
fn redirect_for(err: &CheckoutError) -> Option<Response> {
    match err {
        CheckoutError::EmptyCart => Some(Redirect::to(CART_PATH).into_response()),
        CheckoutError::GatewayRequired => Some(Redirect::to(GATEWAY_PATH).into_response()),
        _ => None,
    }
}

async fn render_gateway(
    state: &AppState,
    session: &Session,
    input: GatewayInput,
    error: Option<String>,
) -> Result<Response, CheckoutError> {
    let flow = flow(state, session);
    let cart = flow.require_cart().await?;
    let user = flow.identity().current().await?;

    Ok(GatewayTemplate {
        nav: Nav::new(user.as_ref()),
        cart: CartView::new(&cart, state.shipping()),
        signed_in_as: user.map(|u| u.full_name),
        login_email: input.login_email,
        registration: input.registration,
        error,
    }
    .into_response())
}

/// Turn a gateway failure into a response: redirect, inline message, or
/// `AppError`.
async fn gateway_failure(
    state: &AppState,
    session: &Session,
    err: CheckoutError,
    input: GatewayInput,
) -> Response {
    if let Some(redirect) = redirect_for(&err) {
        return redirect;
    }

    let CheckoutError::Auth(auth) = err else {
        return AppError::from(err).into_response();
    };
    let Some(message) = auth.user_message() else {
        return AppError::from(auth).into_response();
    };
    tracing::info!(error = %auth, "Gateway rejected");

    match render_gateway(state, session, input, Some(message.to_string())).await {
        Ok(mut page) => {
            *page.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            page
        }
        Err(e) => redirect_for(&e).unwrap_or_else(|| AppError::from(e).into_response()),
    }
}

/// Display the gateway.
#[instrument(skip(state, session))]
pub async fn gateway(State(state): State<AppState>, session: Session) -> Response {
    match render_gateway(&state, &session, GatewayInput::default(), None).await {
        Ok(page) => page,
        Err(e) => redirect_for(&e).unwrap_or_else(|| AppError::from(e).into_response()),
    }
}

/// Gateway: sign in.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match flow(&state, &session).login(&form.email, &form.password).await {
        Ok(_) => Redirect::to(FINAL_PATH).into_response(),
        Err(e) => {
            let input = GatewayInput {
                login_email: form.email,
                ..GatewayInput::default()
            };
            gateway_failure(&state, &session, e, input).await
        }
    }
}

/// Gateway: register. Name and phone are required here.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<Registration>,
) -> Response {
    match flow(&state, &session).register(&form).await {
        Ok(_) => Redirect::to(FINAL_PATH).into_response(),
        Err(e) => {
            let input = GatewayInput {
                registration: RegistrationView::from(&form),
                ..GatewayInput::default()
            };
            gateway_failure(&state, &session, e, input).await
        }
    }
}

/// Gateway: continue as a guest.
#[instrument(skip(state, session))]
pub async fn guest(State(state): State<AppState>, session: Session) -> Response {
    match flow(&state, &session).continue_as_guest().await {
        Ok(()) => Redirect::to(FINAL_PATH).into_response(),
        Err(e) => gateway_failure(&state, &session, e, GatewayInput::default()).await,
    }
}

/// Gateway: continue with the identity already signed in.
#[instrument(skip(state, session))]
pub async fn continue_signed_in(State(state): State<AppState>, session: Session) -> Response {
    match flow(&state, &session).continue_signed_in().await {
        Ok(_) => Redirect::to(FINAL_PATH).into_response(),
        Err(e) => gateway_failure(&state, &session, e, GatewayInput::default()).await,
    }
}

async fn render_final(
    state: &AppState,
    session: &Session,
    form: Option<ShippingForm>,
    error: Option<String>,
) -> Result<Response, CheckoutError> {
    let flow = flow(state, session);
    let cart = flow.finalization().await?;
    let user: Option<CurrentUser> = flow.identity().current().await?;

    Ok(FinalTemplate {
        nav: Nav::new(user.as_ref()),
        cart: CartView::new(&cart, state.shipping()),
        form: form.unwrap_or_else(|| ShippingForm::prefilled(user.as_ref())),
        is_guest: user.is_none(),
        error,
    }
    .into_response())
}

/// Display the shipping form.
#[instrument(skip(state, session))]
pub async fn final_page(State(state): State<AppState>, session: Session) -> Response {
    match render_final(&state, &session, None, None).await {
        Ok(page) => page,
        Err(e) => redirect_for(&e).unwrap_or_else(|| AppError::from(e).into_response()),
    }
}

/// Place the order.
///
/// Signed-in buyers go to their order history, guests to the shop. A failed
/// write keeps the cart and re-renders the form with the values typed.
#[instrument(skip(state, session, form))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ShippingForm>,
) -> Response {
    let err = match flow(&state, &session).place_order(&form).await {
        Ok(placed) => {
            add_breadcrumb(
                "checkout",
                "Order placed",
                &[("order_number", placed.order.order_number.to_string())],
            );
            let location = format!(
                "{}?order={}",
                placed.destination.path(),
                placed.order.order_number
            );
            return Redirect::to(&location).into_response();
        }
        Err(e) => e,
    };

    if let Some(redirect) = redirect_for(&err) {
        return redirect;
    }
    let Some(message) = err.user_message() else {
        return AppError::from(err).into_response();
    };

    let status = if matches!(err, CheckoutError::Submission(_)) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    match render_final(&state, &session, Some(form), Some(message.to_string())).await {
        Ok(mut page) => {
            *page.status_mut() = status;
            page
        }
        Err(e) => redirect_for(&e).unwrap_or_else(|| AppError::from(e).into_response()),
    }
}
