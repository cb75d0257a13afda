//! Contact form route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::Nav;
use crate::services::capture::{self, CaptureError, ContactForm};
use crate::state::AppState;

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub nav: Nav,
    pub form: ContactForm,
    pub error: Option<String>,
    pub success: bool,
}

/// Display the contact form.
///
/// Signed-in visitors get their email filled in.
pub async fn page(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    let form = ContactForm {
        email: user
            .as_ref()
            .map(|u| u.email.to_string())
            .unwrap_or_default(),
        ..ContactForm::default()
    };

    ContactTemplate {
        nav: Nav::new(user.as_ref()),
        form,
        error: None,
        success: false,
    }
}

/// Handle contact form submission.
///
/// Failures re-render the form with the typed values kept.
#[instrument(skip(state, user, form))]
pub async fn submit(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<ContactForm>,
) -> Response {
    let nav = Nav::new(user.as_ref());

    match capture::send_message(state.backend(), &form).await {
        Ok(()) => ContactTemplate {
            nav,
            form: ContactForm::default(),
            error: None,
            success: true,
        }
        .into_response(),
        Err(e) => {
            let status = if let CaptureError::Write(ref source) = e {
                tracing::error!(error = %source, "Failed to store contact message");
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (
                status,
                ContactTemplate {
                    nav,
                    form,
                    error: Some(e.user_message().to_string()),
                    success: false,
                },
            )
                .into_response()
        }
    }
}
