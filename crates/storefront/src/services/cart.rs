//! Cart manager.
//!
//! Wraps the core [`Cart`] with the visitor's key-value store: the cart is
//! loaded once per request and written back after every mutation.

use thiserror::Error;

use district_vinyl_core::{Cart, CartError, Price, Product, ProductId};

use crate::models::session_keys;
use crate::store::{KeyValueStore, KeyValueStoreExt, StoreError};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// The mutation itself was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The cart could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The visitor's cart bound to its store.
pub struct CartManager<'a> {
    store: &'a dyn KeyValueStore,
    cart: Cart,
}

impl<'a> CartManager<'a> {
    /// Load the cart from the store.
    ///
    /// A record that cannot be decoded is discarded and the cart starts
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Session` if the store itself fails.
    pub async fn load(store: &'a dyn KeyValueStore) -> Result<Self, StoreError> {
        let cart = match store.get::<Cart>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(StoreError::Decode { source, .. }) => {
                tracing::warn!(error = %source, "Discarding unreadable cart record");
                store.remove(session_keys::CART).await?;
                Cart::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self { store, cart })
    }

    /// The current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.cart.subtotal()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.item_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    /// Add `quantity` units of `product` and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Cart` if `quantity` is zero (nothing is
    /// written), or `CartServiceError::Store` if persisting fails.
    pub async fn add(&mut self, product: Product, quantity: u32) -> Result<(), CartServiceError> {
        self.cart.add(product, quantity)?;
        self.persist().await?;
        Ok(())
    }

    /// Remove a product and persist. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub async fn remove(&mut self, id: ProductId) -> Result<(), StoreError> {
        self.cart.remove(id);
        self.persist().await
    }

    /// Replace a quantity and persist. Values below one are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub async fn update_quantity(&mut self, id: ProductId, quantity: i64) -> Result<(), StoreError> {
        self.cart.update_quantity(id, quantity);
        self.persist().await
    }

    /// Empty the cart and delete the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    pub async fn clear(&mut self) -> Result<(), StoreError> {
        self.cart.clear();
        self.store.remove(session_keys::CART).await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        self.store.set(session_keys::CART, &self.cart).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use district_vinyl_core::Category;

    use super::*;
    use crate::store::MemoryStore;

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Record {id}"),
            price: price.parse().unwrap(),
            category: Category::Vinyl,
            images: vec![format!("https://img/{id}.jpg")],
            description: None,
            sku: None,
        }
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let store = MemoryStore::new();
        {
            let mut manager = CartManager::load(&store).await.unwrap();
            manager.add(product(1, "20.00"), 2).await.unwrap();
            manager.add(product(2, "15.00"), 1).await.unwrap();
        }

        let manager = CartManager::load(&store).await.unwrap();
        assert_eq!(manager.cart().len(), 2);
        assert_eq!(manager.subtotal(), "55.00".parse().unwrap());
    }

    #[tokio::test]
    async fn test_add_zero_quantity_writes_nothing() {
        let store = MemoryStore::new();
        let mut manager = CartManager::load(&store).await.unwrap();

        let err = manager.add(product(1, "20.00"), 0).await.unwrap_err();
        assert!(matches!(err, CartServiceError::Cart(CartError::InvalidQuantity)));
        assert!(!store.contains(session_keys::CART));
    }

    #[tokio::test]
    async fn test_update_below_one_keeps_quantity() {
        let store = MemoryStore::new();
        let mut manager = CartManager::load(&store).await.unwrap();
        manager.add(product(1, "20.00"), 3).await.unwrap();

        manager.update_quantity(ProductId::new(1), 0).await.unwrap();

        let reloaded = CartManager::load(&store).await.unwrap();
        assert_eq!(reloaded.cart().get(ProductId::new(1)).unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let store = MemoryStore::new();
        let mut manager = CartManager::load(&store).await.unwrap();
        manager.add(product(1, "20.00"), 1).await.unwrap();
        assert!(store.contains(session_keys::CART));

        manager.clear().await.unwrap();
        assert!(manager.is_empty());
        assert!(!store.contains(session_keys::CART));
    }

    #[tokio::test]
    async fn test_corrupt_record_starts_empty() {
        let store = MemoryStore::new();
        store
            .set(session_keys::CART, &serde_json::json!({"not": "a cart"}))
            .await
            .unwrap();

        let manager = CartManager::load(&store).await.unwrap();
        assert!(manager.is_empty());
        assert!(!store.contains(session_keys::CART));
    }
}
