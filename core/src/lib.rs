//! # Statekit Core
//!
//! Core traits and types for the statekit architecture.
//!
//! This crate provides the pure, runtime-free half of the system: the data a
//! store holds and the functions that transform it.
//!
//! ## Core Concepts
//!
//! - **Action**: a string-typed message (`"users/REQUEST"`) with a JSON payload
//! - **Reducer**: pure function `(State, Action, Environment) → State`
//! - **Slice**: one keyed sub-state of the application state, shared behind an `Arc`
//! - **Selector**: a memoized projection of a slice
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - No I/O in reducers; side effects live in runtime tasks
//! - Slices are replaced, never mutated in place, so a pointer comparison is
//!   enough to know whether a slice changed
//!
//! ## Example
//!
//! ```
//! use statekit_core::action::{Action, Verb};
//! use statekit_core::composition::{ReducerTable, RootReducer, SliceReducer};
//! use statekit_core::reducer::Reducer;
//! use std::sync::Arc;
//!
//! #[derive(Clone, Default)]
//! struct Counter {
//!     hits: u32,
//! }
//!
//! let counter = ReducerTable::<Counter>::new()
//!     .on(Action::type_of("counter", Verb::Request), |state, _action| state.hits += 1);
//!
//! let reducer: Arc<dyn SliceReducer> = Arc::new(counter);
//! let root: RootReducer = RootReducer::new([("counter".to_string(), reducer)]);
//!
//! let mut state = root.initial_state();
//! root.reduce(&mut state, Action::new(Action::type_of("counter", Verb::Request)), &());
//! assert_eq!(state.slice::<Counter>("counter").map(|c| c.hits), Some(1));
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};

pub mod action;
pub mod composition;
pub mod memo;
pub mod shape;
pub mod state;
pub mod status;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → State`
///
/// They contain all state-transition logic and are deterministic and testable.
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```
    /// use statekit_core::reducer::Reducer;
    ///
    /// struct Counter;
    ///
    /// impl Reducer for Counter {
    ///     type State = i64;
    ///     type Action = i64;
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, state: &mut i64, delta: i64, _env: &()) {
    ///         *state += delta;
    ///     }
    /// }
    ///
    /// let mut total = 0;
    /// Counter.reduce(&mut total, 5, &());
    /// assert_eq!(total, 5);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Apply an action to the state in place
        ///
        /// Work that has to wait on I/O belongs in a task that reacts to the
        /// action and dispatches its outcome.
        fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment);
    }
}
