//! Selector memoization keyed by slice identity
//!
//! A [`Memo`] remembers the last slice it saw (as a `Weak` pointer, so it
//! never keeps old state alive) together with the value computed from it.
//! Because slices are replaced rather than mutated, the same pointer means the
//! same content and the cached value can be returned as is.

use crate::state::Slice;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Key = Option<Weak<dyn Any + Send + Sync>>;

/// Caches the output of one projection for the last input slice
pub struct Memo<T> {
    last: Mutex<Option<(Key, T)>>,
    recomputations: AtomicUsize,
}

impl<T: Clone> Memo<T> {
    /// An empty cache
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(None),
            recomputations: AtomicUsize::new(0),
        }
    }

    /// Return the cached value for `input`, or compute and cache it
    ///
    /// An absent input (`None`) is a valid key of its own.
    pub fn get_or_compute<F>(&self, input: Option<&Slice>, compute: F) -> T
    where
        F: FnOnce(Option<&Slice>) -> T,
    {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((key, value)) = last.as_ref() {
            if same_key(key.as_ref(), input) {
                return value.clone();
            }
        }

        let value = compute(input);
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        *last = Some((input.map(Arc::downgrade), value.clone()));
        value
    }

    /// Forget the cached value
    pub fn invalidate(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// How many times the projection actually ran
    #[must_use]
    pub fn recomputations(&self) -> usize {
        self.recomputations.load(Ordering::Relaxed)
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("recomputations", &self.recomputations.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// The cached Weak keeps the allocation reserved, so an address match cannot
// be a new slice reusing freed memory.
fn same_key(cached: Option<&Weak<dyn Any + Send + Sync>>, input: Option<&Slice>) -> bool {
    match (cached, input) {
        (None, None) => true,
        (Some(weak), Some(slice)) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(slice)),
        _ => false,
    }
}
