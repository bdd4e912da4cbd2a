// # Schedule Store
//
// Durable CRUD over post records, on top of any KvStore backend.
//
// ## Layers
//
// - `KvStore` (file.rs, memory.rs): persists opaque bytes by key
// - `ScheduleStore`: owns serialization and content addressing
//
// The request path and the dispatcher share one `ScheduleStore` through an
// `Arc`; concurrent access is serialized by the backend.

pub mod file;
pub mod memory;

pub use file::{FileKvStore, FileKvStoreFactory};
pub use memory::{MemoryKvStore, MemoryKvStoreFactory};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::post::{NewPost, PostRecord};
use crate::traits::KvStore;

/// Pending posts, keyed by content address
#[derive(Clone)]
pub struct ScheduleStore {
    backend: Arc<dyn KvStore>,
}

impl ScheduleStore {
    /// Wrap a key-value backend
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self { backend }
    }

    /// Schedule a post and return its content address
    ///
    /// Submitting the same image for the same account again replaces the
    /// pending entry (caption, location and time included) under the same ID.
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: empty payload or malformed account name
    /// - `Error::StorageWrite`: the post is **not** scheduled
    pub async fn submit(&self, post: NewPost) -> Result<String> {
        post.validate()?;
        let record = post.into_record();
        self.put(&record).await?;
        Ok(record.id().to_string())
    }

    /// Store an already built record under its ID
    pub async fn put(&self, record: &PostRecord) -> Result<()> {
        let bytes = record.to_bytes()?;
        self.backend.put(record.id(), bytes).await.map_err(|e| match e {
            Error::StorageWrite(_) => e,
            other => Error::storage_write(other.to_string()),
        })?;

        debug!(
            "Scheduled post {} for account '{}' at {}",
            record.id(),
            record.account(),
            record.publish_at()
        );
        Ok(())
    }

    /// Delete a pending post; absent IDs are a no-op
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.backend.delete(id).await?;
        debug!("Removed post {}", id);
        Ok(())
    }

    /// Point lookup
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: no pending post with this ID
    /// - `Error::Deserialization`: stored bytes are corrupt
    pub async fn get(&self, id: &str) -> Result<PostRecord> {
        let bytes = self
            .backend
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("post {}", id)))?;

        PostRecord::from_bytes(&bytes)
    }

    /// Existence check without decoding the record
    pub async fn has(&self, id: &str) -> Result<bool> {
        self.backend.contains(id).await
    }

    /// Every decodable pending post, in backend iteration order
    ///
    /// Entries that fail to decode are logged and skipped so one corrupt
    /// record cannot stall the whole schedule; they stay in the backend and
    /// remain removable by ID.
    pub async fn list_all(&self) -> Result<Vec<PostRecord>> {
        let entries = self.backend.scan().await?;
        let mut records = Vec::with_capacity(entries.len());

        for (key, bytes) in entries {
            match PostRecord::from_bytes(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable post {}: {}", key, e),
            }
        }

        Ok(records)
    }

    /// Image bytes of a pending post
    pub async fn image(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.get(id).await?.into_payload())
    }

    /// Persist anything the backend still buffers
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }
}

impl std::fmt::Debug for ScheduleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleStore")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}
