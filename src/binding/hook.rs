use serde_json::Value;

use crate::binding::Binding;
use crate::store::{GlobalStore, Subscriber};

/// Undo half of an effect, run before the effect runs again or on unmount.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// An effect run after the host commits a render.
pub type Effect = Box<dyn FnOnce() -> Cleanup + Send>;

/// What a hook-style rendering host provides to the store while a
/// component renders.
pub trait HookHost {
    /// Render-local state seeded with `initial`.
    ///
    /// Returns the component's current local value and an update function
    /// that stores the new value locally, schedules a re-render, and runs
    /// the completion (if any) once that re-render is done.
    fn use_state(&mut self, initial: Value) -> (Value, Subscriber);

    /// Run `effect` after the current render commits. The host runs the
    /// returned cleanup before the next run of this effect, or on unmount.
    fn use_effect(&mut self, effect: Effect);
}

/// Render-cycle scoped binding for hook-style components.
pub struct HookBinding<'h, H: ?Sized> {
    host: &'h mut H,
}

impl<'h, H: HookHost + ?Sized> HookBinding<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }
}

impl<H: HookHost + ?Sized> Binding for HookBinding<'_, H> {
    fn subscriber(&mut self, _name: &str, current: &Value) -> Subscriber {
        let (_, set_local) = self.host.use_state(current.clone());
        set_local
    }

    fn attach(&mut self, store: &GlobalStore, name: &str, subscriber: Subscriber) {
        let store = store.clone();
        let name = name.to_owned();
        self.host.use_effect(Box::new(move || {
            let subscription = store.subscribe(&name, subscriber);
            Box::new(move || subscription.unsubscribe())
        }));
    }
}
