//! Fan-out subscriber lists.
//!
//! Each event channel on the player is a [`Subscribers`] list of handlers
//! with stable [`SubscriptionId`]s. Notification snapshots the handler list
//! and releases the lock before calling anything, so a handler may subscribe
//! or unsubscribe (itself included) from inside its callback. Each call runs
//! under `catch_unwind`: a panicking handler is logged and skipped, and the
//! rest of the round still runs.

use parking_lot::Mutex;
use seamcut_core::SubscriptionId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;
type HandlerList<T> = Mutex<Vec<(SubscriptionId, Handler<T>)>>;

/// Type-erased removal so a [`Subscription`] does not carry the event type.
trait Unsubscribe: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
}

impl<T: 'static> Unsubscribe for HandlerList<T> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }
}

/// Handle returned by every `on_*` registration.
///
/// Dropping the handle leaves the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    channel: &'static str,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the handler. Returns `false` if it was already removed or the
    /// player has been dropped.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}

/// An ordered list of handlers for one event channel.
pub struct Subscribers<T: 'static> {
    channel: &'static str,
    handlers: Arc<HandlerList<T>>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a handler. Handlers run in registration order.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.lock().push((id, Arc::new(handler)));
        tracing::trace!(channel = self.channel, subscription = %id, "Subscriber added");
        let registry: Arc<dyn Unsubscribe> = self.handlers.clone();
        Subscription {
            id,
            channel: self.channel,
            registry: Arc::downgrade(&registry),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Call every handler with `value`. Returns how many handlers panicked.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<(SubscriptionId, Handler<T>)> = self.handlers.lock().clone();
        let mut faults = 0;
        for (id, handler) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(value))) {
                faults += 1;
                tracing::error!(
                    channel = self.channel,
                    subscription = %id,
                    "Subscriber panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
        faults
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
