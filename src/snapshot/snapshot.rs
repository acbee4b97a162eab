use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::warn;

use crate::binding::Owner;
use crate::error::{StoreError, StoreResult};
use crate::store::Completion;

/// Copy the fields in `names` out of `source` into a plain snapshot.
///
/// Fields missing from `source` are skipped. The snapshot is empty when
/// `names` is empty or `source` does not serialize to a JSON object.
pub fn build_saved_state<T>(source: &T, names: &[&str]) -> Map<String, Value>
where
    T: Serialize + ?Sized,
{
    let mut saved = Map::new();
    if names.is_empty() {
        return saved;
    }
    let object = match serde_json::to_value(source) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return saved,
        Err(error) => {
            warn!(%error, "cannot snapshot a value that does not serialize");
            return saved;
        }
    };
    for name in names {
        if let Some(value) = object.get(*name) {
            saved.insert((*name).to_owned(), value.clone());
        }
    }
    saved
}

/// Outcome of [`restore_from_saved_state`].
#[must_use]
#[derive(Debug)]
pub enum Restored {
    /// The snapshot was empty; the target is untouched.
    Unchanged,
    /// Fields were merged into the target.
    Applied,
    /// Fields were merged and the owner is re-rendering.
    Rendering(oneshot::Receiver<()>),
}

impl Restored {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Restored::Unchanged)
    }

    /// Wait for the owner's re-render, if one was started.
    pub async fn rendered(self) -> StoreResult<()> {
        match self {
            Restored::Unchanged | Restored::Applied => Ok(()),
            Restored::Rendering(done) => done.await.map_err(|_| StoreError::RenderDropped),
        }
    }
}

/// Shallow-merge `snapshot` into `target`, overwriting existing fields.
///
/// With an `owner`, a forced re-render is started and the returned
/// [`Restored::Rendering`] resolves once the owner runs the completion.
pub fn restore_from_saved_state(
    target: &mut Map<String, Value>,
    snapshot: &Map<String, Value>,
    owner: Option<&dyn Owner>,
) -> Restored {
    if snapshot.is_empty() {
        return Restored::Unchanged;
    }
    for (name, value) in snapshot {
        target.insert(name.clone(), value.clone());
    }
    let Some(owner) = owner else {
        return Restored::Applied;
    };

    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let completion: Completion = Arc::new(move || {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(());
        }
    });
    owner.force_update(Some(completion));
    Restored::Rendering(rx)
}
