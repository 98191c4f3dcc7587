use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use crate::transport::Frame;

pub type Handler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Registered inbound-message handlers, in registration order
#[derive(Default)]
pub struct Listeners {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    handlers: BTreeMap<u64, Handler>,
}

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking handler never runs under the lock, so the data is intact
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(self: &Arc<Self>, handler: Handler) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.insert(id, handler);
        Subscription {
            id,
            listeners: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.lock().handlers.remove(&id);
    }

    /// Handlers run outside the lock; one added or removed during dispatch
    /// takes effect from the next frame.
    pub fn dispatch(&self, frame: &Frame) {
        let snapshot: Vec<Handler> = self.lock().handlers.values().cloned().collect();
        for handler in snapshot {
            handler(frame);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }
}

/// Returned by `on_message`. Dropping it keeps the handler registered.
#[must_use = "dropping a Subscription leaves the handler registered forever"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}
