//! Newsletter subscription route handlers.
//!
//! The signup form lives in the site footer and is swapped in place by HTMX.
//! Subscribing an address that is already on the list shows the same
//! success message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::services::capture::{self, CaptureError};
use crate::state::AppState;

/// Newsletter subscription form data.
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
}

/// Footer signup fragment (replaces the form via HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/newsletter.html")]
pub struct NewsletterTemplate {
    pub email: String,
    pub success: bool,
    pub message: Option<String>,
}

/// Subscribe to newsletter (HTMX).
#[instrument(skip(state, form))]
pub async fn subscribe(
    State(state): State<AppState>,
    Form(form): Form<SubscribeForm>,
) -> Response {
    match capture::subscribe(state.backend(), &form.email).await {
        Ok(email) => NewsletterTemplate {
            email: email.to_string(),
            success: true,
            message: Some("YOU'RE ON THE LIST".to_string()),
        }
        .into_response(),
        Err(e) => {
            let status = match e {
                CaptureError::Write(ref source) => {
                    tracing::warn!(error = %source, "Newsletter subscription failed");
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CaptureError::MissingFields | CaptureError::InvalidEmail(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            };
            (
                status,
                NewsletterTemplate {
                    email: form.email,
                    success: false,
                    message: Some(e.user_message().to_string()),
                },
            )
                .into_response()
        }
    }
}
