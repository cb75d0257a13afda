//! Newsletter signups and contact messages.

use thiserror::Error;

use district_vinyl_core::{Email, EmailError};

use crate::backend::{Backend, BackendError, ContactMessage, DataService};

/// Errors from the newsletter and contact forms.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A required field is blank.
    #[error("required fields missing")]
    MissingFields,

    /// Malformed email.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The row could not be written.
    #[error("failed to save: {0}")]
    Write(#[from] BackendError),
}

impl CaptureError {
    /// Message shown inline on the form.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingFields => "Please fill in all required fields (*)",
            Self::InvalidEmail(_) => "Please enter a valid email address",
            Self::Write(_) => "Something went wrong. Please try again later",
        }
    }
}

/// Add an email to the newsletter list.
///
/// Subscribing twice is not an error.
///
/// # Errors
///
/// Returns `InvalidEmail` for a malformed address or `Write` if the insert
/// fails for any other reason.
pub async fn subscribe(backend: &dyn Backend, email: &str) -> Result<Email, CaptureError> {
    if email.trim().is_empty() {
        return Err(CaptureError::MissingFields);
    }
    let email = Email::parse(email)?;

    match backend.subscribe_newsletter(&email).await {
        Ok(()) => tracing::info!("Newsletter signup"),
        Err(e) if e.is_conflict() => tracing::debug!("Newsletter email already subscribed"),
        Err(e) => return Err(e.into()),
    }
    Ok(email)
}

/// The contact form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    /// Validate into a message row.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields` or `InvalidEmail`.
    pub fn validate(&self) -> Result<ContactMessage, CaptureError> {
        let required = [&self.first_name, &self.last_name, &self.email, &self.message];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(CaptureError::MissingFields);
        }

        let order_number = self.order_number.trim();
        Ok(ContactMessage {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: Email::parse(&self.email)?,
            order_number: (!order_number.is_empty()).then(|| order_number.to_string()),
            message: self.message.trim().to_string(),
        })
    }
}

/// Validate and store a contact message.
///
/// # Errors
///
/// Returns a validation error or `Write` if the insert fails.
pub async fn send_message(
    backend: &dyn Backend,
    form: &ContactForm,
) -> Result<(), CaptureError> {
    let message = form.validate()?;
    backend.insert_contact_message(&message).await?;
    tracing::info!(has_order = message.order_number.is_some(), "Contact message received");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn contact() -> ContactForm {
        ContactForm {
            first_name: "Ana".to_string(),
            last_name: "Petrovska".to_string(),
            email: "ana@example.com".to_string(),
            order_number: " ".to_string(),
            message: "Where is my record?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_subscription_is_success() {
        let backend = MemoryBackend::new();
        subscribe(&backend, "fan@example.com").await.unwrap();
        let email = subscribe(&backend, "Fan@Example.com").await.unwrap();

        assert!(backend.is_subscribed(&email).unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_malformed_email() {
        let backend = MemoryBackend::new();
        let err = subscribe(&backend, "fan-at-example").await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidEmail(_)));
    }

    #[test]
    fn test_contact_requires_fields() {
        let mut form = contact();
        form.message = String::new();
        assert!(matches!(form.validate(), Err(CaptureError::MissingFields)));
    }

    #[tokio::test]
    async fn test_send_message_stores_row_without_blank_order_number() {
        let backend = MemoryBackend::new();
        send_message(&backend, &contact()).await.unwrap();

        let stored = backend.contact_messages().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].order_number, None);
    }
}
