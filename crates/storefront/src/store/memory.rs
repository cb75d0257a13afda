//! In-memory store for tests and tooling.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KeyValueStore, StoreError};

/// Key-value store held in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .lock()
            .map(|values| values.contains_key(key))
            .unwrap_or(false)
    }

    fn with_values<R>(&self, f: impl FnOnce(&mut HashMap<String, serde_json::Value>) -> R) -> R {
        match self.values.lock() {
            Ok(mut values) => f(&mut values),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.with_values(|values| values.get(key).cloned()))
    }

    async fn set_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.with_values(|values| values.insert(key.to_string(), value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.with_values(|values| values.remove(key));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::KeyValueStoreExt;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("stage", &"gateway").await.unwrap();

        let value: Option<String> = store.get("stage").await.unwrap();
        assert_eq!(value.as_deref(), Some("gateway"));

        store.remove("stage").await.unwrap();
        assert!(!store.contains("stage"));
        assert!(store.get::<String>("stage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_with_wrong_shape_is_decode_error() {
        let store = MemoryStore::new();
        store.set("count", &"not a number").await.unwrap();

        let err = store.get::<u32>("count").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
