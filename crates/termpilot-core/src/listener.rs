//! Per-object listener registries with unsubscribe handles.
//!
//! Every stateful object that fans out events (transports, sessions) owns its
//! own [`ListenerRegistry`]. Registering returns a [`Subscription`]; calling
//! [`Subscription::unsubscribe`] or dropping it removes the listener.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Ordered set of listeners for events of type `T`.
///
/// Cloning yields another handle to the same registry.
pub struct ListenerRegistry<T: ?Sized> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: ?Sized> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: ?Sized> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

fn lock<T: ?Sized>(entries: &Mutex<Entries<T>>) -> MutexGuard<'_, Entries<T>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: ?Sized + 'static> ListenerRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is unsubscribed or dropped, or the registry is cleared.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let id = {
            let mut entries = lock(&self.entries);
            let id = entries.next_id;
            entries.next_id += 1;
            entries.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = weak.upgrade() {
                lock(&entries).listeners.retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// subscribe or unsubscribe re-entrantly.
    pub fn emit(&self, event: &T) {
        let listeners: Vec<Listener<T>> = lock(&self.entries)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Remove every listener.
    pub fn clear(&self) {
        lock(&self.entries).listeners.clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        lock(&self.entries).listeners.len()
    }

    /// True when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle that removes a listener when unsubscribed or dropped.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a cancellation callback.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that does nothing, returned when registering on a
    /// disposed object.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
