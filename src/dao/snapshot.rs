//! Key-value snapshot persistence used by local-only mode.

use std::{
    collections::HashMap,
    fs,
    io::{self, ErrorKind, Write},
    path::PathBuf,
    sync::Mutex,
};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::dao::storage::{StorageError, StorageResult};

/// Durable key-value store holding serialized blobs.
pub trait SnapshotStore: Send + Sync {
    /// Read the blob stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Replace the blob stored under `key`.
    fn set(&self, key: &str, blob: &str) -> StorageResult<()>;
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot `{key}` from `{path}`")]
    Read {
        key: String,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write snapshot `{key}` to `{path}`")]
    Write {
        key: String,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("snapshot key `{key}` is not a plain file name")]
    InvalidKey { key: String },
}

impl From<SnapshotError> for StorageError {
    fn from(err: SnapshotError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SnapshotError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SnapshotError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Read {
                key: key.to_string(),
                path: path.display().to_string(),
                source,
            }
            .into()),
        }
    }

    fn set(&self, key: &str, blob: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let write_err = |source: io::Error| SnapshotError::Write {
            key: key.to_string(),
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;
        // readers must never observe a half-written snapshot
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(blob.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

/// Volatile snapshot store; contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rummyq-snapshot-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn file_store_round_trips_blobs() {
        let dir = temp_dir();
        let store = FileSnapshotStore::new(&dir);

        assert_eq!(store.get("local_queue").unwrap(), None);
        store.set("local_queue", "[1,2,3]").unwrap();
        assert_eq!(store.get("local_queue").unwrap().as_deref(), Some("[1,2,3]"));
        store.set("local_queue", "[]").unwrap();
        assert_eq!(store.get("local_queue").unwrap().as_deref(), Some("[]"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn file_store_leaves_only_the_snapshot_file_behind() {
        let dir = temp_dir();
        let store = FileSnapshotStore::new(&dir);

        store.set("local_games", "[]").unwrap();
        store.set("local_games", "[{}]").unwrap();

        let names = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["local_games.json"]);
        assert_eq!(store.get("local_games").unwrap().as_deref(), Some("[{}]"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let store = FileSnapshotStore::new(temp_dir());
        assert!(store.set("../escape", "{}").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn memory_store_keeps_last_value() {
        let store = MemorySnapshotStore::new();
        store.set("k", "a").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
    }
}
