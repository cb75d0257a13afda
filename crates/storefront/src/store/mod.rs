//! Per-visitor key-value store.
//!
//! The cart, the signed-in identity and the checkout stage are kept per
//! browser. In production the store is the visitor's `tower-sessions`
//! record; tests use [`MemoryStore`].
//!
//! Values are JSON-encoded. A record that fails to decode is reported as
//! [`StoreError::Decode`] so callers can decide whether to discard it.

mod memory;
mod session;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A stored value could not be encoded or decoded.
    #[error("invalid stored value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw string storage addressed by key.
///
/// Implementors only move JSON text around; typed access goes through
/// [`KeyValueStoreExt`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for `key`.
    async fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace the value for `key`.
    async fn set_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// Delete the value for `key`. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed helpers over [`KeyValueStore`].
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read and decode the value for `key`.
    async fn get<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Encode and store `value` under `key`.
    async fn set<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, value).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
