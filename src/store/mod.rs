//! The global state store.
//!
//! A [`GlobalStore`] maps state names to JSON values, fans every write out to
//! the subscribers bound to that name, and persists the non-volatile slots
//! as one snapshot.

mod config;
mod registry;
#[allow(clippy::module_inception)]
mod store;

pub use config::StoreConfig;
pub use registry::{Completion, Subscriber, Subscription};
pub use store::{DiagnosticListener, GlobalStore, GlobalStoreBuilder, Setter};
pub(crate) use store::StoreInner;
