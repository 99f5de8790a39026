use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use log::error;
use parking_lot::Mutex;

use crate::unwind::catch_panic;

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

// Detach Trait
trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

struct ListenerSet<A> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<A>)>>,
}

impl<A: 'static> Detach for ListenerSet<A> {
    fn detach(&self, id: u64) -> bool {
        // the handler is dropped after the lock is released
        let removed = {
            let mut handlers = self.handlers.lock();
            handlers
                .iter()
                .position(|(handler_id, _)| *handler_id == id)
                .map(|index| handlers.remove(index))
        };
        removed.is_some()
    }

    fn contains(&self, id: u64) -> bool {
        self.handlers
            .lock()
            .iter()
            .any(|(handler_id, _)| *handler_id == id)
    }
}

/// An ordered set of handlers fired with a shared value.
///
/// Emission snapshots the handler list first, so handlers may connect or
/// disconnect (themselves included) while being called. A panicking handler is
/// logged and does not prevent the remaining handlers from running.
pub struct Listeners<A> {
    inner: Arc<ListenerSet<A>>,
}

impl<A> Clone for Listeners<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: 'static> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Listeners<A> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListenerSet {
                next_id: AtomicU64::new(0),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn connect<F: Fn(&A) + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.lock().push((id, Arc::new(handler)));

        let inner: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            set: Arc::downgrade(&inner),
        }
    }

    /// Captures the handlers connected right now; later connects and
    /// disconnects do not affect the snapshot
    pub fn snapshot(&self) -> Snapshot<A> {
        let handlers = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        Snapshot { handlers }
    }

    pub fn emit(&self, value: &A) {
        self.snapshot().emit(value);
    }

    /// Disconnects every handler
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.inner.handlers.lock());
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handlers of a [`Listeners`] captured at one instant
pub struct Snapshot<A> {
    handlers: Vec<Handler<A>>,
}

impl<A> Snapshot<A> {
    pub fn emit(&self, value: &A) {
        for handler in &self.handlers {
            if let Err(message) = catch_panic(|| handler(value)) {
                error!("Listener panicked: {message}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Handle to one connected handler.
///
/// Dropping a `Subscription` leaves the handler connected; call
/// [`disconnect`](Subscription::disconnect) or hand it to a
/// [`ResourceScope`](crate::ResourceScope) to tie it to a lifetime.
pub struct Subscription {
    id: u64,
    set: Weak<dyn Detach>,
}

impl Subscription {
    /// A subscription that was never connected to anything
    pub fn detached() -> Self {
        let set: Weak<ListenerSet<()>> = Weak::new();
        Self { id: 0, set }
    }

    pub fn disconnect(&self) {
        if let Some(set) = self.set.upgrade() {
            set.detach(self.id);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.set
            .upgrade()
            .map(|set| set.contains(self.id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
