//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use statekit_core::reducer::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several `when_action` calls apply their actions in order before any
/// assertion runs.
///
/// # Example
///
/// ```
/// use statekit_core::action::Action;
/// use statekit_core::composition::ReducerTable;
/// use statekit_testing::ReducerTest;
///
/// #[derive(Clone, Default)]
/// struct Counter {
///     count: u32,
/// }
///
/// let reducer = ReducerTable::<Counter>::new().on("counter/ADD", |state, _| state.count += 1);
///
/// ReducerTest::new(reducer)
///     .with_env(())
///     .given_state(Counter::default())
///     .when_action(Action::new("counter/ADD"))
///     .when_action(Action::new("counter/ADD"))
///     .then_state(|state| assert_eq!(state.count, 2))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Clone,
    A: Clone,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        for action in self.actions {
            self.reducer.reduce(&mut state, action, &env);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statekit_core::action::Action;
    use statekit_core::composition::ReducerTable;

    #[derive(Clone, Debug, Default)]
    struct TestState {
        count: i32,
    }

    fn counter() -> ReducerTable<TestState> {
        ReducerTable::new()
            .on("counter/INCREMENT", |state: &mut TestState, _| state.count += 1)
            .on("counter/DECREMENT", |state: &mut TestState, _| state.count -= 1)
    }

    // Steps by the amount held in its environment
    struct Stepper;

    impl Reducer for Stepper {
        type State = TestState;
        type Action = Action;
        type Environment = i32;

        fn reduce(&self, state: &mut TestState, _action: Action, step: &i32) {
            state.count += step;
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(counter())
            .with_env(())
            .given_state(TestState { count: 0 })
            .when_action(Action::new("counter/INCREMENT"))
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_sequence() {
        ReducerTest::new(counter())
            .with_env(())
            .given_state(TestState { count: 5 })
            .when_action(Action::new("counter/DECREMENT"))
            .when_action(Action::new("counter/DECREMENT"))
            .when_action(Action::new("unknown"))
            .then_state(|state| {
                assert_eq!(state.count, 3);
            })
            .run();
    }

    #[test]
    fn test_environment_reaches_reducer() {
        ReducerTest::new(Stepper)
            .with_env(5)
            .given_state(TestState::default())
            .when_action(Action::new("tick"))
            .when_action(Action::new("tick"))
            .then_state(|state| assert_eq!(state.count, 10))
            .then_state(|state| assert!(state.count > 0))
            .run();
    }

    #[test]
    #[should_panic(expected = "At least one action")]
    fn test_run_without_action_panics() {
        ReducerTest::new(counter())
            .with_env(())
            .given_state(TestState::default())
            .run();
    }
}
