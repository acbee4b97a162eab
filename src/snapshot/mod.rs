//! Helpers for saving a few fields of some object and putting them back.

#[allow(clippy::module_inception)]
mod snapshot;

pub use snapshot::{build_saved_state, restore_from_saved_state, Restored};
