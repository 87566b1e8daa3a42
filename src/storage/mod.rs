//! Persistent key-value storage
//!
//! The store and the history log only need an opaque asynchronous
//! string-keyed blob store. Concrete backends implement [`KeyValueStore`].

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{PersistenceError, Result};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key holding the ordered timer collection
pub const TIMERS_KEY: &str = "timers";
/// Key holding the ordered category names
pub const CATEGORIES_KEY: &str = "categories";
/// Key holding the completion history
pub const HISTORY_KEY: &str = "completedTimers";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value. `Ok(None)` when the key is absent.
pub async fn load_json<T>(kv: &dyn KeyValueStore, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match kv.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PersistenceError::Corrupt { key: key.to_string(), source }),
        None => Ok(None),
    }
}

/// Encode a value as JSON and write it under `key`
pub async fn save_json<T>(kv: &dyn KeyValueStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|source| PersistenceError::Serialize { key: key.to_string(), source })?;
    kv.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_helpers_round_trip_through_a_backend() {
        let kv = MemoryStore::new();
        save_json(&kv, CATEGORIES_KEY, &vec!["Study", "Break"]).await.unwrap();

        let loaded: Option<Vec<String>> = load_json(&kv, CATEGORIES_KEY).await.unwrap();
        assert_eq!(loaded, Some(vec!["Study".to_string(), "Break".to_string()]));

        let missing: Option<Vec<String>> = load_json(&kv, TIMERS_KEY).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn corrupt_values_are_reported_with_their_key() {
        let kv = MemoryStore::new();
        kv.set(TIMERS_KEY, "{not json".to_string()).await.unwrap();

        let result: Result<Option<Vec<String>>> = load_json(&kv, TIMERS_KEY).await;
        match result {
            Err(PersistenceError::Corrupt { key, .. }) => assert_eq!(key, TIMERS_KEY),
            other => panic!("expected Corrupt error, got {:?}", other),
        }
    }
}
