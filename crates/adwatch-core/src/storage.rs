//! Key/value storage used for session memos, the cooldown marker and the
//! soft-enforcement choice.
//!
//! Two scopes exist: a tab-scoped session store and a durable store that
//! survives reloads. Both are plain string maps behind [`KeyValueStore`].

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Durable key holding the epoch-ms timestamp of the last completed run.
pub const LAST_DETECTION_KEY: &str = "last-adblock-detection";

/// Durable key holding the soft-enforcement choice.
pub const USER_CHOICE_KEY: &str = "adblock-user-choice";

/// Value stored under a session memo key.
pub const MEMO_SENTINEL: &str = "true";

const MEMO_PREFIX: &str = "adblock-detected-";

/// Session key marking `path` as already detected in this tab.
#[must_use]
pub fn session_memo_key(path: &str) -> String {
    format!("{MEMO_PREFIX}{path}")
}

/// String key/value store.
///
/// Implementations must be cheap to call repeatedly; callers treat every
/// error as "value absent".
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store, one per tab session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StorageError {
        StorageError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

/// Durable store persisted as a JSON object in a single file.
///
/// Every write rewrites the file; a lost write only costs a redundant
/// detection run later.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Entries to start a write from. An unparseable file is replaced rather
    /// than blocking every later write.
    async fn read_for_write(&self) -> Result<HashMap<String, String>, StorageError> {
        match self.read_all().await {
            Err(StorageError::Json(e)) => {
                tracing::warn!("Discarding corrupt store {}: {}", self.path.display(), e);
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_for_write().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_for_write().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_memo_key() {
        assert_eq!(session_memo_key("/blog/post"), "adblock-detected-/blog/post");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("state").join("durable.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get(LAST_DETECTION_KEY).await.unwrap(), None);
        store.set(LAST_DETECTION_KEY, "1700000000000").await.unwrap();
        store.set(USER_CHOICE_KEY, "continued").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(LAST_DETECTION_KEY).await.unwrap().as_deref(),
            Some("1700000000000")
        );

        reopened.remove(USER_CHOICE_KEY).await.unwrap();
        assert_eq!(store.get(USER_CHOICE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_heals_on_write() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("durable.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(LAST_DETECTION_KEY).await,
            Err(StorageError::Json(_))
        ));

        store.set(LAST_DETECTION_KEY, "1700000000000").await.unwrap();
        assert_eq!(
            store.get(LAST_DETECTION_KEY).await.unwrap().as_deref(),
            Some("1700000000000")
        );
    }

    #[tokio::test]
    async fn test_file_store_remove_on_corrupt_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("durable.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        store.remove(USER_CHOICE_KEY).await.unwrap();
        store.set(USER_CHOICE_KEY, "continued").await.unwrap();
        assert_eq!(
            store.get(USER_CHOICE_KEY).await.unwrap().as_deref(),
            Some("continued")
        );
    }
}
