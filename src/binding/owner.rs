use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::binding::Binding;
use crate::store::{Completion, GlobalStore, Subscriber, Subscription};

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Ordered mount and unmount observers of one owner.
///
/// The owner's lifecycle driver calls [`mount`](LifecycleObservers::mount)
/// and [`unmount`](LifecycleObservers::unmount); the owner's own handlers
/// and the store's registrations are all just observers, run in the order
/// they were added.
#[derive(Default)]
pub struct LifecycleObservers {
    mount: Mutex<Vec<Observer>>,
    unmount: Mutex<Vec<Observer>>,
    mounted: AtomicBool,
    // Slot names the store already observes through this owner.
    bound: Mutex<HashSet<String>>,
}

impl LifecycleObservers {
    /// Observers of an owner that is not mounted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mount observer. If already mounted it runs right away.
    pub fn on_mount<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        self.mount.lock().push(Arc::clone(&observer));
        if self.is_mounted() {
            observer();
        }
    }

    /// Add an unmount observer.
    pub fn on_unmount<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.unmount.lock().push(Arc::new(observer));
    }

    /// Run every mount observer. No-op if already mounted.
    pub fn mount(&self) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            return;
        }
        let observers = self.mount.lock().clone();
        trace!(observers = observers.len(), "owner mounted");
        for observer in observers {
            observer();
        }
    }

    /// Run every unmount observer. No-op if not mounted.
    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        let observers = self.unmount.lock().clone();
        trace!(observers = observers.len(), "owner unmounted");
        for observer in observers {
            observer();
        }
    }

    /// Whether the owner is between [`mount`](LifecycleObservers::mount) and
    /// [`unmount`](LifecycleObservers::unmount).
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Record that slot `name` is observed; `false` if it already was.
    pub(crate) fn claim(&self, name: &str) -> bool {
        self.bound.lock().insert(name.to_owned())
    }
}

impl fmt::Debug for LifecycleObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleObservers")
            .field("mount", &self.mount.lock().len())
            .field("unmount", &self.unmount.lock().len())
            .field("mounted", &self.is_mounted())
            .field("bound", &self.bound.lock().len())
            .finish()
    }
}

/// A stateful component with an imperative local-state merge and explicit
/// mount/unmount lifecycle.
pub trait Owner: Send + Sync {
    /// The owner's own local value for field `name`, if it has one.
    fn local_state(&self, name: &str) -> Option<Value>;

    /// Merge `{ name: value }` into local state and re-render, running
    /// `completion` once done.
    fn merge_state(&self, name: &str, value: Value, completion: Option<Completion>);

    /// Re-render without changing local state, running `completion` once done.
    fn force_update(&self, completion: Option<Completion>);

    /// The observers the owner's lifecycle driver runs on mount and unmount.
    fn lifecycle(&self) -> &LifecycleObservers;
}

/// What an owner does when a slot it is bound to changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OwnerUpdate {
    /// Merge the new value into the owner's local field of the same name.
    #[default]
    MergeField,
    /// Only force a re-render; the owner reads the store itself.
    ForceUpdate,
}

/// Mount/unmount scoped binding for owner-style components.
///
/// An owner observes each slot name at most once: binding the same owner
/// and name again returns the slot's value but registers nothing new, and
/// the first binding's update mode stays in effect.
pub struct OwnerBinding<O> {
    owner: Arc<O>,
    update: OwnerUpdate,
}

impl<O: Owner + 'static> OwnerBinding<O> {
    /// Bind `owner`, reacting to changes as `update` says.
    pub fn new(owner: &Arc<O>, update: OwnerUpdate) -> Self {
        Self {
            owner: Arc::clone(owner),
            update,
        }
    }
}

impl<O: Owner + 'static> Binding for OwnerBinding<O> {
    fn local_value(&self, name: &str) -> Option<Value> {
        self.owner.local_state(name)
    }

    fn subscriber(&mut self, name: &str, _current: &Value) -> Subscriber {
        // The registry must not keep a destroyed owner alive.
        let owner: Weak<O> = Arc::downgrade(&self.owner);
        let name = name.to_owned();
        match self.update {
            OwnerUpdate::MergeField => Arc::new(move |value: &Value, completion: Option<Completion>| {
                if let Some(owner) = owner.upgrade() {
                    owner.merge_state(&name, value.clone(), completion);
                }
            }),
            OwnerUpdate::ForceUpdate => Arc::new(move |_: &Value, completion: Option<Completion>| {
                if let Some(owner) = owner.upgrade() {
                    owner.force_update(completion);
                }
            }),
        }
    }

    fn attach(&mut self, store: &GlobalStore, name: &str, subscriber: Subscriber) {
        let lifecycle = self.owner.lifecycle();
        if !lifecycle.claim(name) {
            debug!(name, "owner already observes slot");
            return;
        }
        let held: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let store = store.clone();
        let on_mount_name = name.to_owned();
        let on_mount_held = Arc::clone(&held);
        lifecycle.on_mount(move || {
            let subscription = store.subscribe(&on_mount_name, Arc::clone(&subscriber));
            // Replacing an older guard drops it, so a remount never doubles up.
            *on_mount_held.lock() = Some(subscription);
        });
        lifecycle.on_unmount(move || {
            held.lock().take();
        });
    }
}
