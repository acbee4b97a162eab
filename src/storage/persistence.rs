use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::storage::StorageBackend;

/// Storage key the snapshot lives under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "GlobalState";

/// Reads and writes the whole persisted snapshot under a single key.
///
/// The snapshot is a JSON object mapping state names to values. There is no
/// version tag; anything that does not parse as a JSON object is rejected
/// by [`load`](Persistence::load).
#[derive(Clone)]
pub struct Persistence {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl Persistence {
    /// Wrap `backend`, keeping the snapshot under `key`.
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// The storage key the snapshot is written under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize `snapshot` and write it under the storage key.
    pub fn save(&self, snapshot: &Map<String, Value>) -> StoreResult<()> {
        let text = serde_json::to_string(snapshot).map_err(StoreError::Serialize)?;
        self.backend.set_item(&self.key, &text)?;
        debug!(key = %self.key, slots = snapshot.len(), "snapshot saved");
        Ok(())
    }

    /// Read the persisted snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    pub fn load(&self) -> StoreResult<Option<Map<String, Value>>> {
        let Some(text) = self.backend.get_item(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&text).map_err(StoreError::MalformedSnapshot)? {
            Value::Object(map) => Ok(Some(map)),
            // `null` is what an explicitly emptied slot looks like; nothing to merge.
            Value::Null => Ok(None),
            other => Err(StoreError::NotAnObject(kind_of(&other))),
        }
    }

    /// Remove the persisted snapshot entirely. A later [`load`](Persistence::load)
    /// sees nothing stored.
    pub fn erase(&self) -> StoreResult<()> {
        self.backend.remove_item(&self.key)?;
        debug!(key = %self.key, "snapshot erased");
        Ok(())
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence").field("key", &self.key).finish()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn persistence(storage: &MemoryStorage) -> Persistence {
        Persistence::new(Arc::new(storage.clone()), DEFAULT_STORAGE_KEY)
    }

    #[test]
    fn load_missing_key_is_none() {
        let storage = MemoryStorage::new();
        assert!(persistence(&storage).load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let storage = MemoryStorage::new();
        let p = persistence(&storage);

        let mut snapshot = Map::new();
        snapshot.insert("count".into(), json!(3));
        snapshot.insert("user".into(), json!({ "name": "ada" }));
        p.save(&snapshot).unwrap();

        assert_eq!(p.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn rejects_garbage() {
        let storage = MemoryStorage::with_item(DEFAULT_STORAGE_KEY, "not-json");
        let err = persistence(&storage).load().unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshot(_)));
    }

    #[test]
    fn rejects_non_objects() {
        let storage = MemoryStorage::with_item(DEFAULT_STORAGE_KEY, "[1,2,3]");
        let err = persistence(&storage).load().unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject("array")));
    }

    #[test]
    fn erase_removes_entry() {
        let storage = MemoryStorage::new();
        let p = persistence(&storage);
        p.save(&Map::new()).unwrap();
        assert_eq!(storage.len(), 1);

        p.erase().unwrap();
        assert!(storage.is_empty());
    }
}
