//! Key-value persistence behind the candidate store.
//!
//! The operations mirror a small remote key-value service: string values with
//! an optional TTL, plus string sets. Connections are acquired per request via
//! [`StoreHandle`] and released when the request is done.

pub mod sqlite;

use std::path::PathBuf;
use std::time::Duration;

pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Transport(#[from] rusqlite::Error),
    #[error("store path unusable: {0}")]
    Io(#[from] std::io::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

pub trait KvStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// `ttl == None` keeps the value until it is overwritten.
    fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), StoreError>;

    fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Members in insertion order.
    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Run `f` so that either all of its writes land or none do.
    fn atomically<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>;
}

/// Cheap, cloneable description of where the store lives.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    path: PathBuf,
}

impl StoreHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn connect(&self) -> Result<SqliteStore, StoreError> {
        SqliteStore::open(&self.path)
    }

    /// Acquire a connection on the blocking pool, run `f`, release it.
    pub async fn with<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || {
            let store = handle.connect()?;
            let out = f(&store)?;
            store.release()?;
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let handle = StoreHandle::new(dir.path().join("nested").join("kv.sqlite3"));

        handle
            .with(|s| s.set_add("video:verified:a:b", "abc"))
            .await
            .unwrap();
        let members = handle
            .with(|s| s.set_members("video:verified:a:b"))
            .await
            .unwrap();
        assert_eq!(members, vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_unusable_path_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let handle = StoreHandle::new(dir.path());
        let err = handle.with(|s| s.get_string("k")).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
