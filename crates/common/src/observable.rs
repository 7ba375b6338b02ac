//! Observable values: a mutable cell plus a subscriber list, with change
//! notification suppressed by equality.
//!
//! `Observable<T>` is the surface the playback controller exposes its state
//! through. Subscribers receive the current value immediately on
//! subscription and again on every change; setting the same value twice
//! fires nothing. Dropping the returned [`Subscription`] unregisters the
//! callback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct State<T> {
    value: T,
    next_id: u64,
    subscribers: Vec<(u64, Callback<T>)>,
}

/// A thread-safe observable cell. Clones share the same cell.
pub struct Observable<T> {
    inner: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                value,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// The current value.
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Store `value` and notify subscribers, unless it equals the current
    /// value. Returns whether a change happened.
    ///
    /// Callbacks run on the calling thread, outside the cell's lock.
    pub fn set_if_changed(&self, value: T) -> bool {
        let callbacks: Vec<Callback<T>> = {
            let mut state = self.inner.lock();
            if state.value == value {
                return false;
            }
            state.value = value.clone();
            state.subscribers.iter().map(|(_, c)| Arc::clone(c)).collect()
        };
        for callback in callbacks {
            callback(&value);
        }
        true
    }

    /// Register a change callback. The callback is invoked once with the
    /// current value before this returns.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let callback: Callback<T> = Arc::new(callback);
        let (id, current) = {
            let mut state = self.inner.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, Arc::clone(&callback)));
            (id, state.value.clone())
        };
        callback(&current);
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }
}

/// Registration handle returned by [`Observable::subscribe`]. Dropping it
/// removes the callback.
pub struct Subscription<T> {
    inner: Weak<Mutex<State<T>>>,
    id: u64,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
