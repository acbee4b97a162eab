use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::binding::{Binding, Detached, HookBinding, HookHost, Initial, Owner, OwnerBinding, OwnerUpdate};
use crate::error::{StoreError, StoreResult};
use crate::storage::{FileStorage, MemoryStorage, Persistence, StorageBackend};
use crate::store::config::StoreConfig;
use crate::store::registry::{Completion, Subscriber, SubscriberRegistry, Subscription, SubscriptionId};

/// Receives failures the store swallowed (hydration, persistence).
pub type DiagnosticListener = Arc<dyn Fn(&StoreError) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
}

struct StoreState {
    lifecycle: Lifecycle,
    table: HashMap<String, Value>,
    volatile: HashSet<String>,
    registry: SubscriberRegistry,
}

impl StoreState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            table: HashMap::new(),
            volatile: HashSet::new(),
            registry: SubscriberRegistry::default(),
        }
    }

    fn wipe(&mut self) {
        self.table.clear();
        self.volatile.clear();
        self.registry.clear();
    }

    /// The table minus every volatile slot.
    fn persistable(&self) -> Map<String, Value> {
        self.table
            .iter()
            .filter(|(name, _)| !self.volatile.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

pub(crate) struct StoreInner {
    state: RwLock<StoreState>,
    persistence: Persistence,
    diagnostics: RwLock<Vec<DiagnosticListener>>,
    // Never reset, so a stale guard cannot remove a newer registration.
    next_id: AtomicU64,
}

impl StoreInner {
    pub(crate) fn unregister(&self, name: &str, id: SubscriptionId) {
        if self.state.write().registry.remove(name, id) {
            trace!(name, id, "subscriber removed");
        }
    }

    fn report(&self, error: StoreError) {
        warn!(%error, "store failure recovered");
        let listeners = self.diagnostics.read().clone();
        for listener in listeners {
            listener(&error);
        }
    }
}

/// A reactive store of named, optionally persisted state slots.
///
/// `GlobalStore` is a cheap handle: clones share the same slots,
/// subscribers and storage. The store initializes itself lazily on first
/// use, hydrating from storage; [`init`](GlobalStore::init) only makes that
/// explicit.
///
/// # Examples
///
/// ```
/// use global_state::GlobalStore;
/// use serde_json::json;
///
/// let store = GlobalStore::in_memory();
/// store.set_state("count", 5);
/// assert_eq!(store.get_state("count"), Some(json!(5)));
/// ```
#[derive(Clone)]
pub struct GlobalStore {
    inner: Arc<StoreInner>,
}

impl GlobalStore {
    /// Create a store persisting into `storage` under the default key.
    pub fn new(storage: impl StorageBackend + 'static) -> Self {
        Self::builder().storage(storage).build()
    }

    /// Create a store over fresh in-memory storage.
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Start configuring a store: storage backend, storage key and
    /// diagnostic listeners.
    ///
    /// # Examples
    ///
    /// ```
    /// use global_state::{GlobalStore, MemoryStorage};
    ///
    /// let store = GlobalStore::builder()
    ///     .storage(MemoryStorage::new())
    ///     .storage_key("settings")
    ///     .build();
    /// assert_eq!(store.storage_key(), "settings");
    /// ```
    pub fn builder() -> GlobalStoreBuilder {
        GlobalStoreBuilder::default()
    }

    /// Create a store from configuration, opening file storage when a
    /// storage directory is configured.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let builder = Self::builder().config(config.clone());
        let builder = match &config.storage_dir {
            Some(dir) => builder.storage(FileStorage::open(dir)?),
            None => builder.storage(MemoryStorage::new()),
        };
        Ok(builder.build())
    }

    /// Initialize the store and hydrate it from storage. Idempotent.
    ///
    /// A snapshot that cannot be read or parsed leaves the store empty and
    /// is reported to diagnostic listeners; it never fails the caller.
    pub fn init(&self) {
        let failure = {
            let mut state = self.inner.state.write();
            if state.lifecycle == Lifecycle::Initialized {
                return;
            }
            state.wipe();
            state.lifecycle = Lifecycle::Initialized;
            match self.inner.persistence.load() {
                Ok(Some(saved)) => {
                    let slots = saved.len();
                    state.table.extend(saved);
                    debug!(key = self.inner.persistence.key(), slots, "store hydrated");
                    None
                }
                Ok(None) => {
                    debug!(key = self.inner.persistence.key(), "store initialized empty");
                    None
                }
                Err(error) => Some(error),
            }
        };
        if let Some(error) = failure {
            self.inner.report(error);
        }
    }

    fn ensure_initialized(&self) {
        if !self.is_initialized() {
            self.init();
        }
    }

    /// Whether the store has hydrated since it was built or last disposed.
    pub fn is_initialized(&self) -> bool {
        self.inner.state.read().lifecycle == Lifecycle::Initialized
    }

    /// Bind a consumer to slot `name` through `binding`.
    ///
    /// The first bind of a name creates its subscriber entry and writes the
    /// resolved value into the table. The value resolves to the stored
    /// value, else the binding's local value, else `initial`.
    pub fn bind<B>(&self, binding: &mut B, name: &str, initial: impl Into<Initial>) -> Value
    where
        B: Binding + ?Sized,
    {
        self.ensure_initialized();
        let (first_bind, stored) = {
            let mut state = self.inner.state.write();
            let first_bind = state.registry.ensure_entry(name);
            (first_bind, state.table.get(name).cloned())
        };

        let initial: Initial = initial.into();
        let value = match stored {
            Some(value) => value,
            None => binding
                .local_value(name)
                .unwrap_or_else(|| initial.resolve()),
        };

        let subscriber = binding.subscriber(name, &value);
        binding.attach(self, name, subscriber);

        let mut state = self.inner.state.write();
        if first_bind {
            state.table.insert(name.to_owned(), value.clone());
            debug!(name, "slot bound");
            value
        } else {
            state.table.get(name).cloned().unwrap_or(value)
        }
    }

    /// Bind a hook-style consumer.
    ///
    /// The host's render-local setter becomes the subscriber; it is
    /// registered in an after-commit effect and removed by that effect's
    /// cleanup.
    pub fn use_state<H>(&self, host: &mut H, name: &str, initial: impl Into<Initial>) -> (Value, Setter)
    where
        H: HookHost + ?Sized,
    {
        let value = self.bind(&mut HookBinding::new(host), name, initial);
        (value, self.setter(name))
    }

    /// Bind an owner-style consumer.
    ///
    /// Subscribes when the owner mounts and unsubscribes when it unmounts.
    /// An owner observes each slot once; binding the same owner and `name`
    /// again only returns the current value.
    pub fn use_owner_state<O>(
        &self,
        owner: &Arc<O>,
        name: &str,
        initial: impl Into<Initial>,
        update: OwnerUpdate,
    ) -> Value
    where
        O: Owner + 'static,
    {
        self.bind(&mut OwnerBinding::new(owner, update), name, initial)
    }

    /// A handle writing slot `name` through [`set_state`](GlobalStore::set_state).
    pub fn setter(&self, name: &str) -> Setter {
        Setter {
            store: self.clone(),
            name: Arc::from(name),
        }
    }

    /// Read slot `name`, or `None` if it was never bound or written.
    ///
    /// # Examples
    ///
    /// ```
    /// use global_state::GlobalStore;
    /// use serde_json::json;
    ///
    /// let store = GlobalStore::in_memory();
    /// assert_eq!(store.get_state("user"), None);
    ///
    /// store.set_state("user", json!({ "name": "ada" }));
    /// assert_eq!(store.get_state("user"), Some(json!({ "name": "ada" })));
    /// ```
    pub fn get_state(&self, name: &str) -> Option<Value> {
        self.ensure_initialized();
        self.inner.state.read().table.get(name).cloned()
    }

    /// Write slot `name`, notify its subscribers, then persist.
    pub fn set_state(&self, name: &str, value: impl Into<Value>) {
        self.write(name, value.into(), None, false);
    }

    /// Like [`set_state`](GlobalStore::set_state); every subscriber receives
    /// `on_applied` and decides when to run it.
    pub fn set_state_with<F>(&self, name: &str, value: impl Into<Value>, on_applied: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.write(name, value.into(), Some(Arc::new(on_applied)), false);
    }

    /// Mark `name` volatile for good, write it and notify. Never persists.
    ///
    /// # Examples
    ///
    /// ```
    /// use global_state::GlobalStore;
    ///
    /// let store = GlobalStore::in_memory();
    /// store.set_state("saved", 1);
    /// store.set_volatile_state("hover", true);
    ///
    /// assert!(store.is_volatile("hover"));
    /// assert!(!store.persistable_snapshot().contains_key("hover"));
    /// ```
    pub fn set_volatile_state(&self, name: &str, value: impl Into<Value>) {
        self.write(name, value.into(), None, true);
    }

    /// Like [`set_volatile_state`](GlobalStore::set_volatile_state), handing
    /// `on_applied` to every subscriber.
    pub fn set_volatile_state_with<F>(&self, name: &str, value: impl Into<Value>, on_applied: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.write(name, value.into(), Some(Arc::new(on_applied)), true);
    }

    fn write(&self, name: &str, value: Value, completion: Option<Completion>, volatile: bool) {
        self.ensure_initialized();
        let subscribers = {
            let mut state = self.inner.state.write();
            if volatile && state.volatile.insert(name.to_owned()) {
                debug!(name, "slot marked volatile");
            }
            state.table.insert(name.to_owned(), value.clone());
            state.registry.subscribers(name)
        };
        notify(name, &value, &subscribers, completion);
        if !volatile {
            self.persist();
        }
    }

    /// Empty slot `name`, notifying its subscribers with `null`, then drop
    /// the slot and its subscriber entry.
    ///
    /// Outstanding [`Subscription`]s for the slot are orphaned: they no
    /// longer receive anything, and dropping them is a no-op.
    pub fn remove_state(&self, name: &str) {
        self.ensure_initialized();
        let subscribers = {
            let mut state = self.inner.state.write();
            state.table.insert(name.to_owned(), Value::Null);
            state.registry.subscribers(name)
        };
        notify(name, &Value::Null, &subscribers, None);

        let orphaned = {
            let mut state = self.inner.state.write();
            state.table.remove(name);
            state.registry.remove_entry(name)
        };
        debug!(name, orphaned, "slot removed");
        self.persist();
    }

    /// Remove slot `name` and bind it again with a fresh `initial` value and
    /// an empty subscriber entry.
    pub fn reset_state(&self, name: &str, initial: impl Into<Initial>) -> Value {
        self.remove_state(name);
        self.bind(&mut Detached, name, initial)
    }

    /// Drop every slot, volatile mark and subscriber, and erase the
    /// persisted snapshot.
    ///
    /// Storage holds nothing for the key afterwards; the next non-volatile
    /// write saves only what was written since.
    pub fn clear_state(&self) {
        {
            let mut state = self.inner.state.write();
            state.wipe();
            state.lifecycle = Lifecycle::Initialized;
        }
        debug!("store cleared");
        if let Err(error) = self.inner.persistence.erase() {
            self.inner.report(error);
        }
    }

    /// Forget all in-memory state without touching storage. The next
    /// operation initializes and hydrates again.
    pub fn dispose(&self) {
        let mut state = self.inner.state.write();
        state.wipe();
        state.lifecycle = Lifecycle::Uninitialized;
        debug!("store disposed");
    }

    /// Register `subscriber` for slot `name`.
    ///
    /// Slots get a subscriber entry when first bound; subscribing to a
    /// name without one returns an inert guard.
    pub fn subscribe(&self, name: &str, subscriber: Subscriber) -> Subscription {
        self.ensure_initialized();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        if self.inner.state.write().registry.insert(name, id, subscriber) {
            trace!(name, id, "subscriber added");
            Subscription::new(name, id, Arc::downgrade(&self.inner))
        } else {
            debug!(name, "subscribe to unbound slot ignored");
            Subscription::inert(name)
        }
    }

    /// Watch slot `name` with a plain callback. Completions passed to
    /// writes run right after the callback.
    pub fn watch<F>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(
            name,
            Arc::new(move |value: &Value, completion: Option<Completion>| {
                callback(value);
                if let Some(done) = completion {
                    done();
                }
            }),
        )
    }

    /// Add a listener for failures the store recovers from silently.
    pub fn on_diagnostic<F>(&self, listener: F)
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.inner.diagnostics.write().push(Arc::new(listener));
    }

    /// Number of subscribers of `name`, or `None` if it has no entry.
    pub fn subscriber_count(&self, name: &str) -> Option<usize> {
        self.inner.state.read().registry.count(name)
    }

    /// Whether `name` was ever written through
    /// [`set_volatile_state`](GlobalStore::set_volatile_state). The mark lasts
    /// until the slot is removed or the store cleared.
    pub fn is_volatile(&self, name: &str) -> bool {
        self.inner.state.read().volatile.contains(name)
    }

    /// Names of all live slots, sorted.
    pub fn state_names(&self) -> Vec<String> {
        self.ensure_initialized();
        let mut names: Vec<String> = self.inner.state.read().table.keys().cloned().collect();
        names.sort();
        names
    }

    /// What [`set_state`](GlobalStore::set_state) would persist right now.
    pub fn persistable_snapshot(&self) -> Map<String, Value> {
        self.ensure_initialized();
        self.inner.state.read().persistable()
    }

    /// The key the snapshot is persisted under.
    pub fn storage_key(&self) -> &str {
        self.inner.persistence.key()
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &GlobalStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn persist(&self) {
        let snapshot = self.inner.state.read().persistable();
        if let Err(error) = self.inner.persistence.save(&snapshot) {
            self.inner.report(error);
        }
    }
}

impl Default for GlobalStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for GlobalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("GlobalStore")
            .field("key", &self.inner.persistence.key())
            .field("lifecycle", &state.lifecycle)
            .field("slots", &state.table.len())
            .field("volatile", &state.volatile.len())
            .finish()
    }
}

fn notify(name: &str, value: &Value, subscribers: &[Subscriber], completion: Option<Completion>) {
    trace!(name, subscribers = subscribers.len(), "notifying subscribers");
    for subscriber in subscribers {
        subscriber(value, completion.clone());
    }
}

/// Builder for [`GlobalStore`].
#[derive(Default)]
pub struct GlobalStoreBuilder {
    storage: Option<Arc<dyn StorageBackend>>,
    config: StoreConfig,
    diagnostics: Vec<DiagnosticListener>,
}

impl GlobalStoreBuilder {
    /// Persist into `storage`. Defaults to fresh [`MemoryStorage`].
    pub fn storage(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Override the storage key, keeping the rest of the configuration.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    /// Take the storage key from `config`. `storage_dir` is ignored here;
    /// see [`GlobalStore::from_config`].
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a diagnostic listener that is in place before the first hydration.
    pub fn on_diagnostic<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.diagnostics.push(Arc::new(listener));
        self
    }

    /// Build the store. Storage is not touched until first use.
    pub fn build(self) -> GlobalStore {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        GlobalStore {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::new()),
                persistence: Persistence::new(storage, self.config.storage_key),
                diagnostics: RwLock::new(self.diagnostics),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

/// Write handle for one slot, returned to hook-style consumers.
///
/// # Examples
///
/// ```
/// use global_state::GlobalStore;
/// use serde_json::json;
///
/// let store = GlobalStore::in_memory();
/// let count = store.setter("count");
///
/// count.set(2);
/// assert_eq!(count.get(), Some(json!(2)));
/// assert_eq!(store.get_state("count"), Some(json!(2)));
/// ```
#[derive(Clone)]
pub struct Setter {
    store: GlobalStore,
    name: Arc<str>,
}

impl Setter {
    /// The slot this setter writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value of the slot.
    pub fn get(&self) -> Option<Value> {
        self.store.get_state(&self.name)
    }

    /// Write the slot, as [`GlobalStore::set_state`].
    pub fn set(&self, value: impl Into<Value>) {
        self.store.set_state(&self.name, value);
    }

    /// Write the slot with a completion, as [`GlobalStore::set_state_with`].
    pub fn set_with<F>(&self, value: impl Into<Value>, on_applied: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.set_state_with(&self.name, value, on_applied);
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_STORAGE_KEY;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn persisted(storage: &MemoryStorage) -> Map<String, Value> {
        let text = storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn lazy_init_hydrates() {
        let storage = MemoryStorage::with_item(DEFAULT_STORAGE_KEY, r#"{"count":7}"#);
        let store = GlobalStore::new(storage);

        assert!(!store.is_initialized());
        assert_eq!(store.get_state("count"), Some(json!(7)));
        assert!(store.is_initialized());
    }

    #[test]
    fn init_is_idempotent() {
        let storage = MemoryStorage::with_item(DEFAULT_STORAGE_KEY, r#"{"a":1}"#);
        let store = GlobalStore::new(storage);

        store.init();
        store.set_volatile_state("b", 2);
        store.bind(&mut Detached, "c", json!(3));
        store.init();

        assert_eq!(store.state_names(), vec!["a", "b", "c"]);
        assert!(store.is_volatile("b"));
        assert_eq!(store.subscriber_count("c"), Some(0));
    }

    #[test]
    fn set_state_persists_non_volatile() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage.clone());

        store.set_state("count", 1);
        store.set_volatile_state("draft", "hi");
        store.set_state("count", 2);

        assert_eq!(persisted(&storage), json!({ "count": 2 }).as_object().unwrap().clone());
    }

    #[test]
    fn volatile_write_skips_persistence() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage.clone());

        store.set_volatile_state("draft", "hi");
        assert!(storage.is_empty());
    }

    #[test]
    fn subscribers_receive_completion() {
        let store = GlobalStore::in_memory();
        store.bind(&mut Detached, "a", json!(0));

        let done = Arc::new(AtomicUsize::new(0));
        let _sub = store.subscribe(
            "a",
            Arc::new(|_: &Value, completion: Option<Completion>| {
                if let Some(completion) = completion {
                    completion();
                }
            }),
        );

        let done_clone = done.clone();
        store.set_state_with("a", 1, move || {
            done_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_to_unbound_slot_is_inert() {
        let store = GlobalStore::in_memory();
        let sub = store.watch("nothing", |_| panic!("never notified"));
        assert!(!sub.is_active());
        store.set_state("nothing", 1);
        assert_eq!(store.subscriber_count("nothing"), None);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = GlobalStore::in_memory();
        store.bind(&mut Detached, "a", json!(0));

        let sub = store.watch("a", |_| {});
        assert_eq!(store.subscriber_count("a"), Some(1));
        drop(sub);
        assert_eq!(store.subscriber_count("a"), Some(0));
    }

    #[test]
    fn stale_subscription_after_reset_is_harmless() {
        let store = GlobalStore::in_memory();
        store.bind(&mut Detached, "a", json!(0));
        let old = store.watch("a", |_| {});

        store.reset_state("a", json!(1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _new = store.watch("a", move |v| seen_clone.lock().push(v.clone()));

        drop(old);
        assert_eq!(store.subscriber_count("a"), Some(1));
        store.set_state("a", 2);
        assert_eq!(*seen.lock(), vec![json!(2)]);
    }

    #[test]
    fn remove_state_notifies_null_and_drops_entry() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage.clone());
        store.bind(&mut Detached, "a", json!(0));
        store.set_state("a", 1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sub = store.watch("a", move |v| seen_clone.lock().push(v.clone()));

        store.remove_state("a");
        assert_eq!(*seen.lock(), vec![Value::Null]);
        assert_eq!(store.get_state("a"), None);
        assert_eq!(store.subscriber_count("a"), None);
        assert!(persisted(&storage).is_empty());

        // Orphaned: further writes do not reach it.
        store.set_state("a", 5);
        assert_eq!(seen.lock().len(), 1);
        drop(sub);
    }

    #[test]
    fn subscriber_may_write_back() {
        let store = GlobalStore::in_memory();
        store.bind(&mut Detached, "celsius", json!(0));

        let writer = store.clone();
        let _sub = store.watch("celsius", move |v| {
            let c = v.as_f64().unwrap_or_default();
            writer.set_state("fahrenheit", c * 9.0 / 5.0 + 32.0);
        });

        store.set_state("celsius", 100);
        assert_eq!(store.get_state("fahrenheit"), Some(json!(212.0)));
    }

    #[test]
    fn dispose_rehydrates_on_next_use() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage);
        store.set_state("kept", true);
        store.set_volatile_state("lost", true);

        store.dispose();
        assert!(!store.is_initialized());
        assert_eq!(store.get_state("kept"), Some(json!(true)));
        assert_eq!(store.get_state("lost"), None);
    }

    #[test]
    fn hydration_failure_reports_diagnostic() {
        let storage = MemoryStorage::with_item("custom", "{broken");
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = errors.clone();
        let store = GlobalStore::builder()
            .storage(storage)
            .storage_key("custom")
            .on_diagnostic(move |e| {
                assert!(e.is_hydration());
                errors_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        store.init();
        assert!(store.state_names().is_empty());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(store.storage_key(), "custom");
    }

    #[test]
    fn from_config_uses_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            storage_key: "app".to_string(),
            storage_dir: Some(dir.path().to_path_buf()),
        };

        let store = GlobalStore::from_config(&config).unwrap();
        store.set_state("theme", "dark");

        let reopened = GlobalStore::from_config(&config).unwrap();
        assert_eq!(reopened.get_state("theme"), Some(json!("dark")));
        assert!(dir.path().join("app.json").exists());
    }

    #[test]
    fn setter_writes_through_store() {
        let store = GlobalStore::in_memory();
        let setter = store.setter("a");
        setter.set(3);
        assert_eq!(setter.get(), Some(json!(3)));
        assert_eq!(setter.name(), "a");
    }

    /// Storage that reads as empty and refuses every write.
    struct ReadOnlyStorage;

    impl StorageBackend for ReadOnlyStorage {
        fn get_item(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn set_item(&self, key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::StorageWrite {
                key: key.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn remove_item(&self, key: &str) -> StoreResult<()> {
            Err(StoreError::StorageWrite {
                key: key.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[test]
    fn write_failures_become_diagnostics() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        let store = GlobalStore::builder()
            .storage(ReadOnlyStorage)
            .on_diagnostic(move |e| errors_clone.lock().push(e.to_string()))
            .build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        store.bind(&mut Detached, "a", json!(0));
        let _sub = store.watch("a", move |v| seen_clone.lock().push(v.clone()));

        store.set_state("a", 1);
        assert_eq!(store.get_state("a"), Some(json!(1)));
        assert_eq!(*seen.lock(), vec![json!(1)]);
        assert_eq!(errors.lock().len(), 1);

        store.remove_state("a");
        assert_eq!(store.get_state("a"), None);
        assert_eq!(errors.lock().len(), 2);

        store.set_volatile_state("b", 2);
        assert_eq!(errors.lock().len(), 2);

        store.clear_state();
        assert!(store.state_names().is_empty());
        assert_eq!(errors.lock().len(), 3);
    }

    #[test]
    fn write_failures_are_not_hydration_errors() {
        let hydration = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));
        let (hydration_clone, other_clone) = (hydration.clone(), other.clone());
        let store = GlobalStore::builder()
            .storage(ReadOnlyStorage)
            .on_diagnostic(move |e| {
                let counter = if e.is_hydration() { &hydration_clone } else { &other_clone };
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        store.set_state("a", 1);
        store.remove_state("a");
        store.clear_state();

        assert_eq!(hydration.load(Ordering::SeqCst), 0);
        assert_eq!(other.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clear_state_erases_storage_key() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage.clone());
        store.set_state("a", 1);
        assert_eq!(storage.len(), 1);

        store.clear_state();
        assert!(storage.is_empty());

        let reopened = GlobalStore::new(storage.clone());
        assert!(reopened.state_names().is_empty());
    }

    #[test]
    fn volatile_completion_reaches_subscribers() {
        let storage = MemoryStorage::new();
        let store = GlobalStore::new(storage.clone());
        store.bind(&mut Detached, "hover", json!(false));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = store.watch("hover", move |v| seen_clone.lock().push(v.clone()));

        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        store.set_volatile_state_with("hover", true, move || {
            done_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(*seen.lock(), vec![json!(true)]);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(store.is_volatile("hover"));
        assert!(storage.is_empty());
    }

    #[test]
    fn setter_completion_runs_once_per_subscriber() {
        let store = GlobalStore::in_memory();
        store.bind(&mut Detached, "a", json!(0));
        let _first = store.watch("a", |_| {});
        let _second = store.watch("a", |_| {});

        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        store.setter("a").set_with(5, move || {
            done_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.get_state("a"), Some(json!(5)));
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }
}
