//! YAML product catalog.
//!
//! Used to seed the in-memory backend at start-up and by `dv-cli seed`.
//! Entries go through the same rules as the admin inventory form.
//!
//! ```yaml
//! products:
//!   - name: Kind of Blue
//!     price: "29.99"
//!     category: Vinyl
//!     sku: DV-0001
//!     images:
//!       - https://img.example/kind-of-blue.jpg
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use district_vinyl_core::NewProduct;

use crate::services::inventory::{InventoryError, ProductForm};

/// Errors from loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("catalog entry {index} ({name}): {source}")]
    Invalid {
        index: usize,
        name: String,
        #[source]
        source: InventoryError,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<CatalogEntry>,
}

/// One product as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    /// Quoted decimal, e.g. `"24.99"`.
    pub price: String,
    pub category: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
}

impl CatalogEntry {
    /// Validate with the inventory form rules.
    ///
    /// # Errors
    ///
    /// Returns the same `InventoryError` the admin form would.
    pub fn to_new_product(&self) -> Result<NewProduct, InventoryError> {
        ProductForm {
            name: self.name.clone(),
            price: self.price.clone(),
            category: self.category.clone(),
            sku: self.sku.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            images: self.images.join("\n"),
        }
        .validate()
    }
}

/// Parse catalog YAML into products, in file order.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed YAML or
/// `CatalogError::Invalid` for the first entry that fails validation.
pub fn parse_catalog(yaml: &str) -> Result<Vec<NewProduct>, CatalogError> {
    let file: CatalogFile = serde_yaml::from_str(yaml)?;
    file.products
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            entry
                .to_new_product()
                .map_err(|source| CatalogError::Invalid {
                    index,
                    name: entry.name.clone(),
                    source,
                })
        })
        .collect()
}

/// Read and parse a catalog file.
///
/// # Errors
///
/// Returns `CatalogError::Io` if the file cannot be read, otherwise as
/// [`parse_catalog`].
pub fn load_catalog(path: &Path) -> Result<Vec<NewProduct>, CatalogError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&yaml)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::Category;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(
            r#"
products:
  - name: Kind of Blue
    price: "29.99"
    category: Vinyl
    sku: DV-0001
    images:
      - https://img.example/kind-of-blue.jpg
  - name: AT-LP60X
    price: "149.00"
    category: gear
    sku: SHOULD-BE-DROPPED
    description: Fully automatic belt-drive turntable
    images:
      - https://img.example/lp60x.jpg
      - https://img.example/lp60x-side.jpg
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sku(), Some("DV-0001"));
        assert_eq!(products[1].category(), Category::Gear);
        assert_eq!(products[1].sku(), None);
        assert_eq!(products[1].images().len(), 2);
    }

    #[test]
    fn test_invalid_entry_names_index() {
        let err = parse_catalog(
            r#"
products:
  - name: Free Record
    price: "0"
    category: Vinyl
    images: [https://img.example/free.jpg]
"#,
        )
        .unwrap_err();

        assert!(matches!(err, CatalogError::Invalid { index: 0, .. }));
    }

    #[test]
    fn test_empty_catalog() {
        assert!(parse_catalog("products: []").unwrap().is_empty());
    }
}
