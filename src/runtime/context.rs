use std::cell::RefCell;
use std::sync::OnceLock;

use crate::store::GlobalStore;

// Thread-local stack of scoped stores
thread_local! {
    static STORE_STACK: RefCell<Vec<GlobalStore>> = const { RefCell::new(Vec::new()) };
}

/// Ambient store resolution.
///
/// Components normally receive a [`GlobalStore`] explicitly. Where that is
/// inconvenient they can ask for [`GlobalStore::current`], which is the
/// innermost store installed with [`GlobalStore::with_store`] on this
/// thread, or the process-wide [`GlobalStore::global`] otherwise.
///
/// # Examples
///
/// ```
/// use global_state::GlobalStore;
///
/// let store = GlobalStore::in_memory();
/// GlobalStore::with_store(store.clone(), || {
///     GlobalStore::current().set_state("theme", "dark");
/// });
/// assert_eq!(store.get_state("theme"), Some("dark".into()));
/// ```
impl GlobalStore {
    /// The process-wide store, over in-memory storage.
    pub fn global() -> GlobalStore {
        static GLOBAL: OnceLock<GlobalStore> = OnceLock::new();
        GLOBAL.get_or_init(GlobalStore::in_memory).clone()
    }

    /// The innermost scoped store on this thread, or the global one.
    pub fn current() -> GlobalStore {
        STORE_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run `f` with `store` as the current store.
    ///
    /// The store is popped again when `f` returns or panics.
    pub fn with_store<F, R>(store: GlobalStore, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        STORE_STACK.with(|stack| {
            stack.borrow_mut().push(store);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        STORE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Run `f` with a fresh in-memory store as the current store.
    ///
    /// The store is dropped afterwards unless `f` kept a handle to it.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_store(Self::in_memory(), f)
    }
}
