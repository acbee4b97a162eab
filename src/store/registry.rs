use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::store::StoreInner;

/// Callback run after a subscriber has applied a write (e.g. once its
/// re-render finished). Every subscriber of a write receives the same one.
pub type Completion = Arc<dyn Fn() + Send + Sync>;

/// An update function for one mounted consumer of a slot.
pub type Subscriber = Arc<dyn Fn(&Value, Option<Completion>) + Send + Sync>;

/// Unique, never reused id of one registration.
pub(crate) type SubscriptionId = u64;

/// State name → subscribers in registration order.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    entries: HashMap<String, Vec<(SubscriptionId, Subscriber)>>,
}

impl SubscriberRegistry {
    /// Create the entry for `name` if missing. Returns `true` if it was created.
    pub(crate) fn ensure_entry(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_owned(), Vec::new());
        true
    }

    /// Add a subscriber to an existing entry. Returns `false` if `name` has
    /// no entry.
    pub(crate) fn insert(&mut self, name: &str, id: SubscriptionId, subscriber: Subscriber) -> bool {
        match self.entries.get_mut(name) {
            Some(subscribers) => {
                subscribers.push((id, subscriber));
                true
            }
            None => false,
        }
    }

    /// Remove one registration. Returns `true` if it was present.
    pub(crate) fn remove(&mut self, name: &str, id: SubscriptionId) -> bool {
        let Some(subscribers) = self.entries.get_mut(name) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Drop the whole entry for `name`, without notifying anyone.
    pub(crate) fn remove_entry(&mut self, name: &str) -> usize {
        self.entries.remove(name).map_or(0, |subscribers| subscribers.len())
    }

    /// Snapshot of the subscribers of `name`, in registration order.
    pub(crate) fn subscribers(&self, name: &str) -> Vec<Subscriber> {
        self.entries
            .get(name)
            .map(|subscribers| subscribers.iter().map(|(_, s)| Arc::clone(s)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(Vec::len)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// RAII guard for one subscriber registration.
///
/// Dropping the guard (or calling [`unsubscribe`](Subscription::unsubscribe))
/// removes the registration exactly once. A guard outliving its store, its
/// slot, or a [`clear_state`](crate::GlobalStore::clear_state) is inert.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    name: String,
    id: Option<SubscriptionId>,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub(crate) fn new(name: &str, id: SubscriptionId, store: Weak<StoreInner>) -> Self {
        Self {
            name: name.to_owned(),
            id: Some(id),
            store,
        }
    }

    /// A guard that was never registered.
    pub(crate) fn inert(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            id: None,
            store: Weak::new(),
        }
    }

    /// The slot this registration belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this guard still holds a registration.
    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.store.strong_count() > 0
    }

    /// Remove the registration now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(store) = self.store.upgrade() {
            store.unregister(&self.name, id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}
