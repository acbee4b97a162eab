use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::store::{Completion, GlobalStore, Subscriber};

/// Initial value of a slot: a value, or a producer run only if the slot
/// has nothing better.
pub enum Initial {
    Value(Value),
    Lazy(Box<dyn FnOnce() -> Value>),
}

impl Initial {
    pub fn lazy<F>(produce: F) -> Self
    where
        F: FnOnce() -> Value + 'static,
    {
        Initial::Lazy(Box::new(produce))
    }

    pub fn resolve(self) -> Value {
        match self {
            Initial::Value(value) => value,
            Initial::Lazy(produce) => produce(),
        }
    }
}

impl From<Value> for Initial {
    fn from(value: Value) -> Self {
        Initial::Value(value)
    }
}

impl fmt::Debug for Initial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initial::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Initial::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// How one kind of consumer observes a slot.
///
/// [`GlobalStore::bind`] resolves the slot value and then asks the binding
/// for the update function to notify, and to register that function for as
/// long as the consumer observes the store.
pub trait Binding {
    /// A value the consumer already holds for `name`, consulted when the
    /// store has none.
    fn local_value(&self, _name: &str) -> Option<Value> {
        None
    }

    /// The update function run on every write to `name`. `current` is the
    /// value the consumer is bound with.
    fn subscriber(&mut self, name: &str, current: &Value) -> Subscriber;

    /// Register `subscriber` with `store`, scoped to the consumer's lifetime.
    fn attach(&mut self, store: &GlobalStore, name: &str, subscriber: Subscriber);
}

/// Binding without a consumer: the slot is created, nobody subscribes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Detached;

impl Binding for Detached {
    fn subscriber(&mut self, _name: &str, _current: &Value) -> Subscriber {
        Arc::new(|_: &Value, _: Option<Completion>| {})
    }

    fn attach(&mut self, _store: &GlobalStore, _name: &str, _subscriber: Subscriber) {}
}
