// # File Key-Value Store
//
// File-based implementation of KvStore with crash recovery.
//
// ## Purpose
//
// Keeps the pending-post queue across daemon restarts and crashes.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON and value encoding on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "9f86d0...": "eyJpZCI6Ij..."
//   }
// }
// ```
//
// Values are base64 encoded; the store never looks inside them.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::kv_store::{KvStore, KvStoreFactory};

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based key-value store with crash recovery
///
/// Every mutation rewrites the whole file while holding the write lock, so
/// writers are serialized and a failed write leaves both the file and the
/// in-memory view unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use postsched_core::store::FileKvStore;
/// use postsched_core::traits::KvStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileKvStore::new("/var/lib/postsched/schedule.json").await?;
///
///     // Atomically written to disk
///     store.put("post-id", b"bytes".to_vec()).await?;
///     assert!(store.contains("post-id").await?);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    entries: BTreeMap<String, String>,
}

impl FileKvStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, return `Error::Deserialization` and leave both files
    ///    untouched
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Load entries from file with automatic recovery
    ///
    /// Only corruption triggers recovery; a file that cannot be read at all
    /// (permissions, I/O) is reported to the caller.
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, Vec<u8>>, Error> {
        match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded schedule store: {} entries", entries.len());
                Ok(entries)
            }
            Err(Error::Deserialization(reason)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    reason
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::error!("No backup file found for {}", path.display());
                    return Err(Error::deserialization(format!(
                        "Store file {} is corrupted and has no backup ({}). \
                        Move it aside to start with an empty schedule.",
                        path.display(),
                        reason
                    )));
                }

                match Self::load(&backup_path).await {
                    Ok(entries) => {
                        tracing::info!("Recovered store from backup: {} entries", entries.len());

                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(entries)
                    }
                    Err(backup_err) => {
                        tracing::error!("Backup also unreadable: {}", backup_err);
                        Err(Error::deserialization(format!(
                            "Store file {} and its backup are both unreadable ({}; {}). \
                            Move them aside to start with an empty schedule.",
                            path.display(),
                            reason,
                            backup_err
                        )))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load entries from file
    async fn load(path: &Path) -> Result<HashMap<String, Vec<u8>>, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::storage_read(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::deserialization(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        file.entries
            .into_iter()
            .map(|(key, encoded)| {
                BASE64
                    .decode(encoded.as_bytes())
                    .map(|value| (key.clone(), value))
                    .map_err(|e| {
                        Error::deserialization(format!("Invalid value encoding for key {}: {}", key, e))
                    })
            })
            .collect()
    }

    /// Write entries to file atomically
    ///
    /// Callers hold the write lock, which is what serializes writers.
    async fn write_entries(&self, entries: &HashMap<String, Vec<u8>>) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            entries: entries
                .iter()
                .map(|(key, value)| (key.clone(), BASE64.encode(value)))
                .collect(),
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::storage_write(format!("Failed to serialize store: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(&json).await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.sync_all().await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::storage_write(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore store file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::storage_write(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored store file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut guard = self.entries.write().await;
        let previous = guard.insert(key.to_string(), value);

        if let Err(e) = self.write_entries(&guard).await {
            // Roll back so memory keeps matching disk
            match previous {
                Some(old) => guard.insert(key.to_string(), old),
                None => guard.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut guard = self.entries.write().await;
        let Some(previous) = guard.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.write_entries(&guard).await {
            guard.insert(key.to_string(), previous);
            return Err(e);
        }

        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let guard = self.entries.read().await;
        Ok(guard.contains_key(key))
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let guard = self.entries.read().await;
        Ok(guard
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every mutation is already on disk
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for [`FileKvStore`]
///
/// Expects the serialized `StoreConfig::File { path }`.
pub struct FileKvStoreFactory;

#[async_trait]
impl KvStoreFactory for FileKvStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn KvStore>, Error> {
        let path = config["path"]
            .as_str()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Error::config("File store requires a non-empty 'path'"))?;

        Ok(Box::new(FileKvStore::new(path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");

        let store = FileKvStore::new(&path).await.unwrap();

        // Initially empty
        assert!(store.scan().await.unwrap().is_empty());

        store.put("post-1", vec![0, 159, 146, 150]).await.unwrap();
        assert_eq!(store.get("post-1").await.unwrap(), Some(vec![0, 159, 146, 150]));

        // Verify file was written
        assert!(path.exists());

        // Load new instance and verify persistence
        let store2 = FileKvStore::new(&path).await.unwrap();
        assert_eq!(store2.get("post-1").await.unwrap(), Some(vec![0, 159, 146, 150]));
    }

    #[tokio::test]
    async fn test_file_store_delete_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");

        let store = FileKvStore::new(&path).await.unwrap();
        store.put("a", b"1".to_vec()).await.unwrap();
        store.put("b", b"2".to_vec()).await.unwrap();
        store.delete("a").await.unwrap();

        // Deleting an absent key is a no-op
        store.delete("a").await.unwrap();

        let store2 = FileKvStore::new(&path).await.unwrap();
        assert!(!store2.contains("a").await.unwrap());
        assert!(store2.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");

        let store = FileKvStore::new(&path).await.unwrap();
        store.put("a", b"first".to_vec()).await.unwrap();

        // Second write creates the backup of the first
        store.put("b", b"second".to_vec()).await.unwrap();

        let backup_path = FileKvStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        // Corrupt the store file
        fs::write(&path, b"corrupted json data").await.unwrap();

        let store2 = FileKvStore::new(&path)
            .await
            .expect("corrupted file should be recovered from backup");

        // Backup holds the state before the last write
        assert!(store2.contains("a").await.unwrap());
        assert!(!store2.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_without_backup_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let truncated = br#"{"version":"1.0","entries":{"id1":"AAAA","id2":"BBBB""#;
        fs::write(&path, truncated).await.unwrap();

        let result = FileKvStore::new(&path).await;
        assert!(matches!(result, Err(Error::Deserialization(_))));

        // Nothing was overwritten, so the entries can still be salvaged by hand
        assert_eq!(fs::read(&path).await.unwrap(), truncated.to_vec());
        assert!(!FileKvStore::backup_path(&path).exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_with_corrupt_backup_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let backup_path = FileKvStore::backup_path(&path);
        fs::write(&path, b"{ not json").await.unwrap();
        fs::write(&backup_path, b"also not json").await.unwrap();

        let result = FileKvStore::new(&path).await;
        assert!(matches!(result, Err(Error::Deserialization(_))));
        assert_eq!(fs::read(&backup_path).await.unwrap(), b"also not json".to_vec());
    }

    #[tokio::test]
    async fn test_file_store_failed_write_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");

        let store = FileKvStore::new(&path).await.unwrap();
        store.put("a", b"1".to_vec()).await.unwrap();

        // Make the store file path unwritable by replacing the directory
        drop(dir);

        let result = store.put("b", b"2".to_vec()).await;
        assert!(matches!(result, Err(Error::StorageWrite(_))));
        assert!(!store.contains("b").await.unwrap());
        assert!(store.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_factory_requires_path() {
        let result = FileKvStoreFactory.create(&serde_json::json!({"type": "file"})).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
