//! `tower-sessions` backed store.

use async_trait::async_trait;
use tower_sessions::Session;

use super::{KeyValueStore, StoreError};

#[async_trait]
impl KeyValueStore for Session {
    async fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.get_value(key).await?)
    }

    async fn set_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.insert_value(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.remove_value(key).await?;
        Ok(())
    }
}
