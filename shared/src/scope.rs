use std::{
    fmt, mem,
    sync::{Arc, Weak},
};

use log::{error, trace, warn};
use parking_lot::Mutex;

use crate::{subscription::Subscription, unwind::catch_panic};

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one entry of a [`ResourceScope`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey(u64);

struct Entry {
    key: EntryKey,
    release: ReleaseFn,
}

struct ScopeState {
    released: bool,
    next_key: u64,
    entries: Vec<Entry>,
}

struct ScopeInner {
    state: Mutex<ScopeState>,
    parent: Option<(Weak<ScopeInner>, EntryKey)>,
}

impl ScopeInner {
    fn new(parent: Option<(Weak<ScopeInner>, EntryKey)>) -> Self {
        Self {
            state: Mutex::new(ScopeState {
                released: false,
                next_key: 0,
                entries: Vec::new(),
            }),
            parent,
        }
    }

    fn reserve_key(&self) -> EntryKey {
        let mut state = self.state.lock();
        let key = EntryKey(state.next_key);
        state.next_key += 1;
        key
    }

    fn push(&self, key: EntryKey, release: ReleaseFn) {
        let rejected = {
            let mut state = self.state.lock();
            if state.released {
                Some(release)
            } else {
                state.entries.push(Entry { key, release });
                None
            }
        };

        if let Some(release) = rejected {
            trace!("Scope already released, running release operation immediately");
            run_release(release);
        }
    }

    fn take(&self, key: EntryKey) -> Option<Entry> {
        let mut state = self.state.lock();
        let index = state.entries.iter().position(|entry| entry.key == key)?;
        Some(state.entries.remove(index))
    }

    fn release(&self) {
        let entries = {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            state.released = true;
            mem::take(&mut state.entries)
        };

        for entry in entries.into_iter().rev() {
            run_release(entry.release);
        }

        // detach from the parent, the parent's entry for us would be a no-op now
        if let Some((parent, key)) = &self.parent {
            if let Some(parent) = parent.upgrade() {
                let entry = parent.take(*key);
                drop(entry);
            }
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.released {
            return;
        }
        state.released = true;
        let entries = mem::take(&mut state.entries);
        if !entries.is_empty() {
            warn!(
                "ResourceScope dropped without release, releasing {} entries",
                entries.len()
            );
        }
        for entry in entries.into_iter().rev() {
            run_release(entry.release);
        }
    }
}

fn run_release(release: ReleaseFn) {
    if let Err(message) = catch_panic(release) {
        error!("Release operation panicked: {message}");
    }
}

/// A cleanup arena: an ordered list of (resource, release operation) pairs.
///
/// Releasing the scope runs every release operation exactly once, in reverse
/// insertion order. Child scopes are entries of their parent. Anything
/// acquired after release has begun is released immediately instead of being
/// registered.
///
/// Cloning a `ResourceScope` yields another handle to the same scope. When
/// the last handle of an unreleased scope is dropped the scope releases
/// itself.
#[derive(Clone)]
pub struct ResourceScope {
    inner: Arc<ScopeInner>,
}

impl Default for ResourceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceScope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner::new(None)),
        }
    }

    /// Takes ownership of `resource`; `release` receives it back when the
    /// scope is released
    pub fn acquire<T, F>(&self, resource: T, release: F) -> EntryKey
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.add(move || release(resource))
    }

    /// Registers a bare release operation
    pub fn add<F: FnOnce() + Send + 'static>(&self, release: F) -> EntryKey {
        let key = self.inner.reserve_key();
        self.inner.push(key, Box::new(release));
        key
    }

    /// Disconnects `subscription` when the scope is released
    pub fn track(&self, subscription: Subscription) -> EntryKey {
        self.acquire(subscription, |subscription| subscription.disconnect())
    }

    /// Creates a nested scope, registered as an entry of this one
    pub fn create_child(&self) -> ResourceScope {
        let key = self.inner.reserve_key();
        let child = Arc::new(ScopeInner::new(Some((Arc::downgrade(&self.inner), key))));

        let registered = child.clone();
        self.inner.push(key, Box::new(move || registered.release()));

        ResourceScope { inner: child }
    }

    /// Releases a single entry ahead of the rest of the scope. Returns false
    /// if the entry is unknown or already released.
    pub fn remove(&self, key: EntryKey) -> bool {
        match self.inner.take(key) {
            Some(entry) => {
                run_release(entry.release);
                true
            }
            None => false,
        }
    }

    /// Releases every entry in reverse insertion order. Calling it again is a
    /// no-op.
    pub fn release(&self) {
        self.inner.release();
    }

    pub fn is_released(&self) -> bool {
        self.inner.state.lock().released
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ResourceScope")
            .field("entries", &state.entries.len())
            .field("released", &state.released)
            .finish()
    }
}
