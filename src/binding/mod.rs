//! Bindings between UI components and store slots.
//!
//! A [`Binding`] decides two things for one kind of consumer: which update
//! function the store calls on writes, and how long that function stays
//! registered. Hook-style components register per render commit
//! ([`HookBinding`]); owner-style components register between mount and
//! unmount ([`OwnerBinding`]).

#[allow(clippy::module_inception)]
mod binding;
mod hook;
mod owner;

pub use binding::{Binding, Detached, Initial};
pub use hook::{Cleanup, Effect, HookBinding, HookHost};
pub use owner::{LifecycleObservers, Owner, OwnerBinding, OwnerUpdate};
