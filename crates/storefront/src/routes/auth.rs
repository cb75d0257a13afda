//! Authentication route handlers.
//!
//! Storefront login, registration and logout. Failures re-render the form
//! with an inline message and the typed values kept (never the password).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::Nav;
use crate::services::{AuthError, IdentityResolver, Registration};
use crate::state::AppState;

/// Where a signed-in visitor lands.
const AFTER_SIGN_IN: &str = "/dashboard";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Registration values echoed back into the form. No password.
#[derive(Clone, Debug, Default)]
pub struct RegistrationView {
    pub email: String,
    pub full_name: String,
    pub phone: String,
}

impl From<&Registration> for RegistrationView {
    fn from(input: &Registration) -> Self {
        Self {
            email: input.email.clone(),
            full_name: input.full_name.clone(),
            phone: input.phone.clone(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub email: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub form: RegistrationView,
    pub error: Option<String>,
}

/// Render an identity failure: inline for anything the visitor can fix,
/// `AppError` otherwise.
pub(crate) fn auth_failure(err: AuthError, render: impl FnOnce(String) -> Response) -> Response {
    match err.user_message() {
        Some(message) => {
            tracing::info!(error = %err, "Authentication rejected");
            let mut response = render(message.to_string());
            *response.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            response
        }
        None => AppError::from(err).into_response(),
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to(AFTER_SIGN_IN).into_response();
    }

    LoginTemplate {
        nav: Nav::default(),
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);

    match identity.login(&form.email, &form.password).await {
        Ok(_) => Redirect::to(AFTER_SIGN_IN).into_response(),
        Err(e) => auth_failure(e, |message| {
            LoginTemplate {
                nav: Nav::default(),
                email: form.email,
                error: Some(message),
            }
            .into_response()
        }),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to(AFTER_SIGN_IN).into_response();
    }

    RegisterTemplate {
        nav: Nav::default(),
        form: RegistrationView::default(),
        error: None,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// Name and phone are optional here; the checkout gateway requires them.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<Registration>,
) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);

    match identity.register(&form, false).await {
        Ok(_) => Redirect::to(AFTER_SIGN_IN).into_response(),
        Err(e) => auth_failure(e, |message| {
            RegisterTemplate {
                nav: Nav::default(),
                form: RegistrationView::from(&form),
                error: Some(message),
            }
            .into_response()
        }),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout. The cart is kept.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    let identity = IdentityResolver::new(state.backend(), &session);

    match identity.logout().await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_debug_redacts_password() {
        let form = LoginForm {
            email: "fan@example.com".to_string(),
            password: "hunter22".to_string(),
        };
        let debug = format!("{form:?}");
        assert!(debug.contains("fan@example.com"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn test_auth_failure_renders_inline_with_422() {
        let response = auth_failure(AuthError::InvalidCredentials, |message| {
            assert_eq!(message, "INVALID EMAIL OR PASSWORD");
            StatusCode::OK.into_response()
        });
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_auth_failure_backend_is_app_error() {
        let response = auth_failure(
            AuthError::Backend(crate::backend::BackendError::Unauthorized),
            |_| unreachable!("backend failures are not rendered inline"),
        );
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
