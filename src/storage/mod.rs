//! Persistent storage for the store.
//!
//! The store only ever talks to storage through the synchronous,
//! string-keyed [`StorageBackend`] contract. [`Persistence`] layers the JSON
//! snapshot format on top of it.

mod backend;
mod persistence;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use persistence::{Persistence, DEFAULT_STORAGE_KEY};
