//! Admin role management commands.
//!
//! # Usage
//!
//! ```bash
//! dv-cli admin promote -e owner@example.com
//! dv-cli admin demote -e owner@example.com
//! ```
//!
//! The account must already exist (registered through the storefront).
//!
//! # Environment Variables
//!
//! - `BACKEND_URL` - Remote data service base URL
//! - `BACKEND_SERVICE_KEY` - Service key allowed to write `profiles`

use thiserror::Error;

use district_vinyl_core::{Email, EmailError, UserRole};
use district_vinyl_storefront::backend::{BackendError, DataService};

use super::{ConnectError, service_backend};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Could not reach the remote data service.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No profile with this email.
    #[error("No account found with email: {0}")]
    NotFound(Email),

    /// The profile could not be updated.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Set the role of the account with this email.
///
/// # Errors
///
/// Returns `AdminError::NotFound` if no profile has this email, or a
/// connection/backend error.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let backend = service_backend()?;

    if !backend.set_profile_role(&email, role).await? {
        return Err(AdminError::NotFound(email));
    }

    tracing::info!(email = %email, role = %role, "Role updated");
    Ok(())
}
