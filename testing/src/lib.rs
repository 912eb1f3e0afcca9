//! # Statekit Testing
//!
//! Testing utilities and helpers for statekit.
//!
//! This crate provides:
//! - Mock implementations of the environment's I/O ([`MockGateway`])
//! - Canned records and responses ([`fixtures`])
//! - Store and subscription helpers
//! - Property-based testing strategies
//! - The Given/When/Then [`ReducerTest`] harness
//!
//! ## Example
//!
//! ```ignore
//! use statekit_testing::{MockGateway, fixtures, helpers};
//!
//! #[tokio::test]
//! async fn test_users_load() {
//!     let gateway: Arc<dyn HttpGateway> =
//!         Arc::new(MockGateway::new().respond_with(fixtures::ok(json!(fixtures::users(2)))));
//!     let (store, injector) = helpers::app_store(Vec::new(), gateway);
//!
//!     let _mount = users_module().mount(&injector).await?;
//!     let mut actions = store.subscribe();
//!     helpers::next_matching(&mut actions, |a| a.is("users/INSERT"), Duration::from_secs(1)).await;
//! }
//! ```

pub mod fixtures;
pub mod mocks;
mod reducer_test;

/// Test helpers and utilities
pub mod helpers {
    use statekit_core::action::Action;
    use statekit_core::composition::{RootReducer, SliceReducer};
    use statekit_runtime::{AppStore, Injector, Store};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast::{self, error::RecvError};

    /// A store over `statics` plus an injector feeding it
    #[must_use]
    pub fn app_store<E>(
        statics: Vec<(String, Arc<dyn SliceReducer>)>,
        environment: E,
    ) -> (AppStore<E>, Arc<Injector<E>>)
    where
        E: Send + Sync + 'static,
    {
        let root = RootReducer::new(statics.clone());
        let store = Store::new(root.initial_state(), root, environment);
        let injector = Arc::new(Injector::new(store.clone(), statics));
        (store, injector)
    }

    /// Wait for the next action matching `predicate`
    ///
    /// Returns `None` on timeout or when the store is gone. Lag is skipped.
    pub async fn next_matching<F>(
        actions: &mut broadcast::Receiver<Action>,
        predicate: F,
        timeout: Duration,
    ) -> Option<Action>
    where
        F: Fn(&Action) -> bool,
    {
        tokio::time::timeout(timeout, async {
            loop {
                match actions.recv().await {
                    Ok(action) if predicate(&action) => return Some(action),
                    Ok(_) | Err(RecvError::Lagged(_)) => {},
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    /// Collect action types until one matches `stop` (inclusive)
    ///
    /// Stops early on timeout; the types seen so far are returned.
    pub async fn types_until<F>(
        actions: &mut broadcast::Receiver<Action>,
        stop: F,
        timeout: Duration,
    ) -> Vec<String>
    where
        F: Fn(&Action) -> bool,
    {
        let mut seen = Vec::new();
        let _ = tokio::time::timeout(timeout, async {
            while let Ok(action) = actions.recv().await {
                seen.push(action.action_type.to_string());
                if stop(&action) {
                    break;
                }
            }
        })
        .await;
        seen
    }

    /// Route `tracing` output to the test harness, filtered by `RUST_LOG`
    ///
    /// Safe to call from every test; only the first call installs a subscriber.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    /// Ids as the backend sends them: numbers or numeric strings
    pub fn arb_id() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0u64..50).prop_map(|id| json!(id)),
            (0u64..50).prop_map(|id| json!(id.to_string())),
        ]
    }

    /// User records, about half of them conforming to `fixtures::user_shape`
    pub fn arb_user_record() -> impl Strategy<Value = Value> {
        prop_oneof![
            2 => (arb_id(), "[A-Za-z]{1,8}").prop_map(|(id, name)| json!({ "id": id, "name": name })),
            1 => arb_id().prop_map(|id| json!({ "id": id, "name": 0 })),
            1 => "[A-Za-z]{1,8}".prop_map(|name| json!({ "name": name })),
        ]
    }
}

// Re-export commonly used items
pub use mocks::{InMemoryCredentialStore, MockGateway};
pub use reducer_test::ReducerTest;
