//! Seed the remote data service from a catalog file.
//!
//! Every entry is validated with the same rules as the admin inventory form
//! before anything is written, so a bad entry aborts the whole run.

use std::path::Path;

use thiserror::Error;

use district_vinyl_storefront::backend::{BackendError, DataService};
use district_vinyl_storefront::catalog::{CatalogError, load_catalog};

use super::{ConnectError, service_backend};

/// Errors from seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The catalog could not be read or failed validation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Could not reach the remote data service.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A product insert failed. Earlier products stay inserted.
    #[error("Failed to insert '{name}' after {inserted} products: {source}")]
    Insert {
        name: String,
        inserted: usize,
        #[source]
        source: BackendError,
    },
}

/// Insert every product in `file`.
///
/// With `dry_run` the catalog is only validated.
///
/// # Errors
///
/// Returns `SeedError::Catalog` for an unreadable or invalid catalog, or
/// `SeedError::Insert` naming the product that failed.
pub async fn catalog(file: &Path, dry_run: bool) -> Result<(), SeedError> {
    tracing::info!(path = %file.display(), "Loading catalog");
    let products = load_catalog(file)?;
    tracing::info!(count = products.len(), "Catalog validated");

    if dry_run {
        for product in &products {
            tracing::info!(
                name = product.name(),
                category = %product.category(),
                price = %product.price(),
                "Would insert"
            );
        }
        return Ok(());
    }

    let backend = service_backend()?;
    let mut inserted = 0;
    for product in &products {
        let stored = backend
            .insert_product(product, None)
            .await
            .map_err(|source| SeedError::Insert {
                name: product.name().to_string(),
                inserted,
                source,
            })?;
        inserted += 1;
        tracing::info!(id = %stored.id, name = %stored.name, "Inserted");
    }

    tracing::info!(inserted, "Seeding complete");
    Ok(())
}
