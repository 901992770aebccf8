//! A value that tells its listeners when it changes.
//!
//! The handle is cheap to clone; all clones share the same value and
//! listener list. Listeners run after the value is stored and outside any
//! lock, so they may read or even set the observable again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::bus::lock;

type Listener<T> = dyn Fn(&T, &T) + Send + Sync;

struct Inner<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<(u64, Arc<Listener<T>>)>>,
    next_id: AtomicU64,
}

pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Store `value` and notify listeners with `(new, old)`.
    /// Setting an equal value is not a change and notifies no one.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut current = lock(&self.inner.value);
            if *current == value {
                return false;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        let listeners: Vec<Arc<Listener<T>>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&value, &old);
        }
        true
    }

    /// Derive the next value from the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get());
        self.set(next)
    }

    /// Register a listener. Keep the returned handle to remove it later.
    pub fn on_change<F>(&self, listener: F) -> Unlisten<T>
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let listener: Arc<Listener<T>> = Arc::new(listener);
        lock(&self.inner.listeners).push((id, listener));
        Unlisten {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }
}

impl<T> Default for Observable<T>
where
    T: Clone + PartialEq + Send + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable")
            .field(&*lock(&self.inner.value))
            .finish()
    }
}

/// Removes one listener. Dropping it without calling
/// [`unlisten`](Self::unlisten) leaves the listener registered.
pub struct Unlisten<T> {
    inner: Weak<Inner<T>>,
    id: u64,
}

impl<T> Unlisten<T> {
    /// Returns false if the listener or the observable is already gone.
    pub fn unlisten(self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut listeners = lock(&inner.listeners);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}
