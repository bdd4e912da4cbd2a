// # Memory Key-Value Store
//
// In-memory implementation of KvStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where losing the queue on restart
// is acceptable.
//
// ## Crash Behavior
//
// - All pending posts are lost on restart/crash
// - No recovery possible (state is in-memory only)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::kv_store::{KvStore, KvStoreFactory};

/// In-memory key-value store implementation
///
/// This implementation stores all values in a HashMap protected by a RwLock.
/// Clones share the same map.
///
/// # Example
///
/// ```rust,no_run
/// use postsched_core::store::MemoryKvStore;
/// use postsched_core::traits::KvStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryKvStore::new();
///
///     store.put("post", b"bytes".to_vec()).await?;
///     assert!(store.contains("post").await?);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of keys in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let guard = self.inner.read().await;
        Ok(guard.contains_key(key))
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryKvStore`]
pub struct MemoryKvStoreFactory;

#[async_trait]
impl KvStoreFactory for MemoryKvStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn KvStore>, Error> {
        Ok(Box::new(MemoryKvStore::new()))
    }
}
