//! CLI subcommands.

pub mod admin;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

use district_vinyl_storefront::backend::{BackendError, RestBackend};

/// Errors from connecting to the remote data service.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The client could not be built.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Client for the remote data service, authenticated with the service key.
///
/// Reads `BACKEND_URL` and `BACKEND_SERVICE_KEY` (after loading `.env`).
///
/// # Errors
///
/// Returns `ConnectError::MissingEnvVar` if either variable is unset.
pub fn service_backend() -> Result<RestBackend, ConnectError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("BACKEND_URL").map_err(|_| ConnectError::MissingEnvVar("BACKEND_URL"))?;
    let key = std::env::var("BACKEND_SERVICE_KEY")
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar("BACKEND_SERVICE_KEY"))?;

    tracing::info!(url = %url, "Connecting to remote data service");
    Ok(RestBackend::new(&url, key)?)
}
