//! Reducer composition utilities
//!
//! This module provides the two building blocks the store is assembled from:
//! - **[`ReducerTable`]**: a reducer for one slice, written as a table of
//!   action type → handler; unknown actions leave the slice untouched
//! - **[`RootReducer`]**: combines keyed slice reducers into a reducer over
//!   the whole [`AppState`], each reducer seeing only its own slice
//!
//! Both implement [`SliceReducer`], the type-erased form a registry stores, so
//! a `RootReducer` can itself be nested under a key.
//!
//! # Examples
//!
//! ```
//! use statekit_core::action::Action;
//! use statekit_core::composition::{ReducerTable, RootReducer, SliceReducer};
//! use statekit_core::state::AppState;
//! use std::sync::Arc;
//!
//! #[derive(Clone, Default)]
//! struct Flags {
//!     dark_mode: bool,
//! }
//!
//! let flags = ReducerTable::<Flags>::new()
//!     .on("flags/TOGGLE_DARK", |state, _| state.dark_mode = !state.dark_mode);
//!
//! let reducer: Arc<dyn SliceReducer> = Arc::new(flags);
//! let root: RootReducer = RootReducer::new([("flags".to_string(), reducer)]);
//!
//! let mut state = root.initial_state();
//! root.reduce_state(&mut state, &Action::new("flags/TOGGLE_DARK"));
//! assert_eq!(state.slice::<Flags>("flags").map(|f| f.dark_mode), Some(true));
//! ```

use crate::action::{Action, ActionType};
use crate::reducer::Reducer;
use crate::state::{AppState, Slice};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A reducer over one type-erased slice
///
/// This is the form reducers take inside registries. Identity matters: two
/// registrations are "the same reducer" when their `Arc`s point to the same
/// allocation.
pub trait SliceReducer: Send + Sync {
    /// The slice this reducer starts from
    fn initial_slice(&self) -> Slice;

    /// Apply an action to the slice
    ///
    /// Implementations replace `*slice` with a new `Arc` when they handle the
    /// action and leave it untouched otherwise. Returns whether it was replaced.
    fn reduce_slice(&self, slice: &mut Slice, action: &Action) -> bool;
}

type Handler<S> = Arc<dyn Fn(&mut S, &Action) + Send + Sync>;

/// A slice reducer written as a table of action type → handler
///
/// Handlers receive a private copy of the state, so the previous slice stays
/// valid for anyone still holding it.
pub struct ReducerTable<S> {
    initial: S,
    handlers: HashMap<ActionType, Handler<S>>,
}

impl<S> ReducerTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// An empty table starting from `S::default()`
    #[must_use]
    pub fn new() -> Self
    where
        S: Default,
    {
        Self::with_initial(S::default())
    }

    /// An empty table starting from `initial`
    #[must_use]
    pub fn with_initial(initial: S) -> Self {
        Self {
            initial,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for an action type, replacing any previous one
    #[must_use]
    pub fn on<F>(mut self, action_type: impl Into<ActionType>, handler: F) -> Self
    where
        F: Fn(&mut S, &Action) + Send + Sync + 'static,
    {
        self.handlers.insert(action_type.into(), Arc::new(handler));
        self
    }

    /// Add every handler of `other`; on conflicts `other` wins
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.handlers.extend(other.handlers);
        self
    }

    /// Check whether an action type has a handler
    #[must_use]
    pub fn handles(&self, action_type: &ActionType) -> bool {
        self.handlers.contains_key(action_type)
    }

    /// The state this table starts from
    #[must_use]
    pub const fn initial_state(&self) -> &S {
        &self.initial
    }
}

impl<S> Default for ReducerTable<S>
where
    S: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ReducerTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(ActionType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ReducerTable").field("handles", &types).finish()
    }
}

impl<S> Reducer for ReducerTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    type State = S;
    type Action = Action;
    type Environment = ();

    fn reduce(&self, state: &mut S, action: Action, _env: &()) {
        if let Some(handler) = self.handlers.get(&action.action_type) {
            handler(state, &action);
        }
    }
}

impl<S> SliceReducer for ReducerTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn initial_slice(&self) -> Slice {
        Arc::new(self.initial.clone())
    }

    fn reduce_slice(&self, slice: &mut Slice, action: &Action) -> bool {
        let Some(handler) = self.handlers.get(&action.action_type) else {
            return false;
        };

        let Some(current) = (**slice).downcast_ref::<S>() else {
            tracing::warn!(
                action = %action.action_type,
                expected = std::any::type_name::<S>(),
                "Slice has an unexpected type, action ignored"
            );
            return false;
        };

        let mut next = current.clone();
        handler(&mut next, action);
        *slice = Arc::new(next);
        true
    }
}

/// Combines keyed slice reducers into a reducer over [`AppState`]
///
/// Every action is offered to every slice reducer. Slices without a stored
/// value start from their reducer's initial slice.
///
/// The environment parameter only exists so the root reducer fits a store
/// whose environment is `E`; slice reducers never see it.
pub struct RootReducer<E = ()> {
    reducers: BTreeMap<String, Arc<dyn SliceReducer>>,
    _environment: PhantomData<fn(&E)>,
}

impl<E> RootReducer<E> {
    /// Combine the given keyed reducers
    #[must_use]
    pub fn new(reducers: impl IntoIterator<Item = (String, Arc<dyn SliceReducer>)>) -> Self {
        Self {
            reducers: reducers.into_iter().collect(),
            _environment: PhantomData,
        }
    }

    /// The reducer registered under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn SliceReducer>> {
        self.reducers.get(key)
    }

    /// Registered keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }

    /// A state holding every reducer's initial slice
    #[must_use]
    pub fn initial_state(&self) -> AppState {
        let mut state = AppState::new();
        self.hydrate(&mut state);
        state
    }

    /// Insert the initial slice of every reducer whose key is missing from `state`
    ///
    /// Returns the number of slices inserted.
    pub fn hydrate(&self, state: &mut AppState) -> usize {
        let mut inserted = 0;
        for (key, reducer) in &self.reducers {
            if !state.contains(key) {
                state.insert(key.clone(), reducer.initial_slice());
                inserted += 1;
            }
        }
        inserted
    }

    /// Offer `action` to every slice reducer
    ///
    /// Returns the number of slices that were replaced.
    pub fn reduce_state(&self, state: &mut AppState, action: &Action) -> usize {
        let mut changed = 0;
        for (key, reducer) in &self.reducers {
            let slot = state.slot_or_insert_with(key, || reducer.initial_slice());
            if reducer.reduce_slice(slot, action) {
                changed += 1;
            }
        }
        changed
    }
}

impl<E> Clone for RootReducer<E> {
    fn clone(&self) -> Self {
        Self {
            reducers: self.reducers.clone(),
            _environment: PhantomData,
        }
    }
}

impl<E> Default for RootReducer<E> {
    fn default() -> Self {
        Self::new([])
    }
}

impl<E> fmt::Debug for RootReducer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootReducer")
            .field("keys", &self.reducers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E> Reducer for RootReducer<E> {
    type State = AppState;
    type Action = Action;
    type Environment = E;

    fn reduce(&self, state: &mut AppState, action: Action, _env: &E) {
        let changed = self.reduce_state(state, &action);
        tracing::trace!(action = %action.action_type, changed, "Root reducer applied action");
    }
}

impl<E> SliceReducer for RootReducer<E> {
    fn initial_slice(&self) -> Slice {
        Arc::new(self.initial_state())
    }

    fn reduce_slice(&self, slice: &mut Slice, action: &Action) -> bool {
        let Some(current) = (**slice).downcast_ref::<AppState>() else {
            tracing::warn!(action = %action.action_type, "Nested slice is not an AppState");
            return false;
        };

        let mut next = current.clone();
        if self.reduce_state(&mut next, action) == 0 {
            return false;
        }
        *slice = Arc::new(next);
        true
    }
}

/// Combine keyed reducers; shorthand for [`RootReducer::new`]
#[must_use]
pub fn combine_reducers<E>(
    reducers: impl IntoIterator<Item = (String, Arc<dyn SliceReducer>)>,
) -> RootReducer<E> {
    RootReducer::new(reducers)
}

/// Check whether two registrations hold the same reducer
#[must_use]
pub fn same_reducer(a: &Arc<dyn SliceReducer>, b: &Arc<dyn SliceReducer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Downcast helper for tests and selectors
#[must_use]
pub fn slice_as<S: Any + Send + Sync>(slice: &Slice) -> Option<&S> {
    (**slice).downcast_ref::<S>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Counter {
        value: i32,
    }

    fn counter_table(prefix: &str) -> ReducerTable<Counter> {
        ReducerTable::new()
            .on(format!("{prefix}/INCREMENT"), |state: &mut Counter, _| state.value += 1)
            .on(format!("{prefix}/DECREMENT"), |state: &mut Counter, _| state.value -= 1)
    }

    fn root() -> RootReducer {
        let a: Arc<dyn SliceReducer> = Arc::new(counter_table("a"));
        let b: Arc<dyn SliceReducer> = Arc::new(counter_table("b"));
        combine_reducers([("a".to_string(), a), ("b".to_string(), b)])
    }

    #[test]
    fn test_table_reducer_trait() {
        let table = counter_table("a");
        let mut state = Counter::default();

        table.reduce(&mut state, Action::new("a/INCREMENT"), &());
        table.reduce(&mut state, Action::new("a/INCREMENT"), &());
        table.reduce(&mut state, Action::new("b/INCREMENT"), &());
        assert_eq!(state.value, 2);
        assert!(table.handles(&ActionType::new("a/DECREMENT")));
    }

    #[test]
    fn test_each_slice_sees_only_its_actions() {
        let root = root();
        let mut state = root.initial_state();

        let changed = root.reduce_state(&mut state, &Action::new("a/INCREMENT"));
        assert_eq!(changed, 1);
        assert_eq!(state.slice::<Counter>("a").unwrap().value, 1);
        assert_eq!(state.slice::<Counter>("b").unwrap().value, 0);
    }

    #[test]
    fn test_unhandled_action_keeps_slice_pointer() {
        let root = root();
        let mut state = root.initial_state();
        let before = Arc::clone(state.get("b").unwrap());

        root.reduce_state(&mut state, &Action::new("a/INCREMENT"));
        assert!(Arc::ptr_eq(&before, state.get("b").unwrap()));

        root.reduce_state(&mut state, &Action::new("b/INCREMENT"));
        assert!(!Arc::ptr_eq(&before, state.get("b").unwrap()));
        // The previous slice is still intact for whoever held it
        assert_eq!(slice_as::<Counter>(&before), Some(&Counter { value: 0 }));
    }

    #[test]
    fn test_missing_slice_is_initialized_on_reduce() {
        let root = root();
        let mut state = AppState::new();

        root.reduce_state(&mut state, &Action::new("noop"));
        assert!(state.contains("a"));
        assert!(state.contains("b"));
        assert_eq!(root.hydrate(&mut state), 0);
    }

    #[test]
    fn test_nested_root_reducer() {
        let inner: Arc<dyn SliceReducer> = Arc::new(root());
        let outer: RootReducer = combine_reducers([("admin".to_string(), inner)]);
        let mut state = outer.initial_state();

        outer.reduce_state(&mut state, &Action::new("b/DECREMENT"));
        let nested = state.lookup(&["admin", "b"]).unwrap();
        assert_eq!(slice_as::<Counter>(&nested), Some(&Counter { value: -1 }));
    }

    #[test]
    fn test_merge_later_table_wins() {
        let base = counter_table("a");
        let override_table =
            ReducerTable::new().on("a/INCREMENT", |state: &mut Counter, _| state.value += 10);
        let merged = base.merge(override_table);

        let mut state = Counter::default();
        merged.reduce(&mut state, Action::new("a/INCREMENT"), &());
        merged.reduce(&mut state, Action::new("a/DECREMENT"), &());
        assert_eq!(state.value, 9);
    }

    #[test]
    fn test_reducer_identity() {
        let a: Arc<dyn SliceReducer> = Arc::new(counter_table("a"));
        let same = Arc::clone(&a);
        let other: Arc<dyn SliceReducer> = Arc::new(counter_table("a"));

        assert!(same_reducer(&a, &same));
        assert!(!same_reducer(&a, &other));
    }

    proptest! {
        /// Slices only change for their own actions, and a slice reduced by
        /// nothing keeps its allocation
        #[test]
        fn slices_follow_only_their_actions(ops in prop::collection::vec((any::<bool>(), any::<bool>()), 0..50)) {
            let root = root();
            let mut state = root.initial_state();
            let b_before = Arc::clone(state.get("b").unwrap());

            let mut expected_a = 0;
            for (increment, _) in &ops {
                let action = if *increment { "a/INCREMENT" } else { "a/DECREMENT" };
                expected_a += if *increment { 1 } else { -1 };
                prop_assert_eq!(root.reduce_state(&mut state, &Action::new(action)), 1);
            }

            prop_assert_eq!(state.slice::<Counter>("a").unwrap().value, expected_a);
            prop_assert!(Arc::ptr_eq(&b_before, state.get("b").unwrap()));

            let b_actions = ops.iter().filter(|(_, touch_b)| *touch_b).count();
            for _ in 0..b_actions {
                root.reduce_state(&mut state, &Action::new("b/INCREMENT"));
            }
            prop_assert_eq!(state.slice::<Counter>("b").unwrap().value, i32::try_from(b_actions).unwrap());
        }
    }
}
