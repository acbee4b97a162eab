use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Synchronous string-keyed storage medium.
///
/// Implementations hold raw strings only; encoding is the job of
/// [`Persistence`](crate::storage::Persistence).
pub trait StorageBackend: Send + Sync {
    /// Read the string stored under `key`, or `None` if nothing is stored.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key` from storage. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> StoreResult<()>;
}

/// In-memory storage.
///
/// Clones share the same backing map, so a fresh store built over a clone
/// sees everything the previous store wrote. This is how tests simulate a
/// process restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-seeded with one item.
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.items.write().insert(key.into(), value.into());
        storage
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.items.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

/// Directory-backed storage: each key lives in `<dir>/<key>.json`, with `%`,
/// `/` and `\` percent-encoded in the file name.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (or create) a storage directory.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::StorageWrite {
            key: dir.display().to_string(),
            source,
        })?;
        debug!(dir = %dir.display(), "file storage opened");
        Ok(Self { dir })
    }

    /// The directory this storage writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Percent-encoding keeps the mapping injective and the file inside `dir`.
        let mut file = String::with_capacity(key.len() + 5);
        for c in key.chars() {
            match c {
                '%' => file.push_str("%25"),
                '/' => file.push_str("%2F"),
                '\\' => file.push_str("%5C"),
                c => file.push(c),
            }
        }
        file.push_str(".json");
        self.dir.join(file)
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::StorageRead {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let map = |source: std::io::Error| StoreError::StorageWrite {
            key: key.to_owned(),
            source,
        };
        std::fs::write(&tmp, value).map_err(map)?;
        std::fs::rename(&tmp, &path).map_err(map)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::StorageWrite {
                key: key.to_owned(),
                source,
            }),
        }
    }
}
