// # Key-Value Store Trait
//
// Defines the interface for the durable byte store underneath the schedule.
//
// ## Purpose
//
// The schedule keeps every pending post as an opaque blob keyed by its content
// address. The store only has to persist bytes; serialization and ID derivation
// belong to `ScheduleStore`.
//
// ## Implementations
//
// - File-based: JSON file with atomic rename and backup (`FileKvStore`)
// - In-memory: `MemoryKvStore` (tests, throwaway deployments)
//
// ## Usage
//
// ```rust,ignore
// use postsched_core::KvStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* KvStore implementation */;
//
//     store.put("key", b"value".to_vec()).await?;
//     assert_eq!(store.get("key").await?, Some(b"value".to_vec()));
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for durable key-value store implementations
///
/// Every method is its own transaction: a `put` either lands completely or
/// fails with [`crate::Error::StorageWrite`].
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// request path and the dispatcher share one store; implementations serialize
/// writers internally (single writer at a time is expected).
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime on disk access
/// - **Idempotent delete**: deleting an absent key is `Ok(())`
/// - **No business logic**: the store never inspects values
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Durably written
    /// - `Err(Error::StorageWrite)`: The write did not happen
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), crate::Error>;

    /// Read the value stored under `key`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))`: The stored value
    /// - `Ok(None)`: No such key
    /// - `Err(Error::StorageRead)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, crate::Error>;

    /// Delete `key` if present
    async fn delete(&self, key: &str) -> Result<(), crate::Error>;

    /// Existence check that does not copy the value out
    async fn contains(&self, key: &str) -> Result<bool, crate::Error> {
        Ok(self.get(key).await?.is_some())
    }

    /// Snapshot of every `(key, value)` pair
    ///
    /// Ordering is whatever the backend iterates in; callers must not rely on it.
    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing key-value stores from configuration
#[async_trait]
pub trait KvStoreFactory: Send + Sync {
    /// Create a KvStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: The serialized `StoreConfig` for this backend
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn KvStore>, crate::Error>;
}
