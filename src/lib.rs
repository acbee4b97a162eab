//! # Global State
//!
//! Named, reactive, optionally persistent state slots shared by UI
//! components without passing values down the tree.
//!
//! ## Store
//!
//! A [`GlobalStore`] maps state names to JSON values:
//! - `set_state` writes a slot, notifies every subscriber of that slot in
//!   registration order, and persists all non-volatile slots as one snapshot
//! - `set_volatile_state` does the same but marks the slot as never persisted
//! - the store hydrates itself from storage on first use
//!
//! ## Bindings
//!
//! Components bind to slots through one of two strategies:
//! - hook-style components ([`HookHost`]) subscribe per render commit
//! - owner-style components ([`Owner`]) subscribe between mount and unmount
//!
//! ## Example
//!
//! ```
//! use global_state::{GlobalStore, MemoryStorage};
//! use serde_json::json;
//!
//! let storage = MemoryStorage::new();
//! let store = GlobalStore::new(storage.clone());
//! store.set_state("count", 5);
//! store.set_volatile_state("draft", json!({ "text": "hi" }));
//!
//! // A later run over the same storage
//! let restarted = GlobalStore::new(storage);
//! assert_eq!(restarted.get_state("count"), Some(json!(5)));
//! assert_eq!(restarted.get_state("draft"), None);
//! ```

pub mod binding;
pub mod error;
pub mod runtime;
pub mod snapshot;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use binding::{
    Binding, Detached, HookBinding, HookHost, Initial, LifecycleObservers, Owner, OwnerBinding,
    OwnerUpdate,
};
pub use error::{StoreError, StoreResult};
pub use snapshot::{build_saved_state, restore_from_saved_state, Restored};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{Completion, GlobalStore, Setter, StoreConfig, Subscriber, Subscription};
