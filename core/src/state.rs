//! Application state as a map of keyed slices
//!
//! Each reducer registered with the store owns one slice. Slices are stored
//! behind `Arc<dyn Any>` so reducers of unrelated types can share one state
//! tree; readers recover the concrete type with [`AppState::slice`].
//!
//! A slice is never mutated in place. A reducer that handles an action swaps in
//! a new `Arc`, so "did this slice change" is a pointer comparison.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One type-erased sub-state
pub type Slice = Arc<dyn Any + Send + Sync>;

/// The whole state tree: slice key → slice
#[derive(Clone, Default)]
pub struct AppState {
    slices: BTreeMap<String, Slice>,
}

impl AppState {
    /// An empty state tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw slice stored under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Slice> {
        self.slices.get(key)
    }

    /// The slice stored under `key`, if it has type `S`
    #[must_use]
    pub fn slice<S>(&self, key: &str) -> Option<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        Arc::clone(self.slices.get(key)?).downcast::<S>().ok()
    }

    /// Follow nested slices (each intermediate one an `AppState`) down a key path
    ///
    /// An empty path yields `None`.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<Slice> {
        let (first, rest) = path.split_first()?;
        if rest.is_empty() {
            return self.get(first).cloned();
        }
        self.slice::<Self>(first)?.lookup(rest)
    }

    /// Store a slice under `key`, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, slice: Slice) {
        self.slices.insert(key.into(), slice);
    }

    /// Wrap a value and store it under `key`
    pub fn insert_state<S>(&mut self, key: impl Into<String>, state: S)
    where
        S: Any + Send + Sync,
    {
        self.insert(key, Arc::new(state));
    }

    /// Mutable access to the slot of `key`, creating it with `init` when absent
    pub fn slot_or_insert_with(&mut self, key: &str, init: impl FnOnce() -> Slice) -> &mut Slice {
        self.slices.entry(key.to_string()).or_insert_with(init)
    }

    /// Check whether a slice exists under `key`
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slices.contains_key(key)
    }

    /// Slice keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    /// Number of slices
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Check if there are no slices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("slices", &self.slices.keys().collect::<Vec<_>>())
            .finish()
    }
}
