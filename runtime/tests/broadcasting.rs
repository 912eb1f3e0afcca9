//! Integration tests for action broadcasting across the store, tasks and
//! mounted modules.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use serde_json::{Value, json};
use statekit_core::action::Action;
use statekit_core::composition::{ReducerTable, RootReducer, SliceReducer};
use statekit_runtime::{
    AppStore, Injector, ModuleScope, REPLACE_ACTION, Store, StoreConfig, TaskContext,
    TaskDescriptor, TaskFn, TaskMode, TaskRef,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Feed {
    items: Vec<String>,
    requested: u32,
}

fn feed_reducer() -> Arc<dyn SliceReducer> {
    Arc::new(
        ReducerTable::<Feed>::new()
            .on("feed/REQUEST", |state, _| state.requested += 1)
            .on("feed/SUCCESS", |state, action| {
                if let Some(items) = action.payload.as_array() {
                    state.items = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                }
            }),
    )
}

fn session_reducer() -> Arc<dyn SliceReducer> {
    Arc::new(ReducerTable::<Option<String>>::new().on("session/SET", |state, action| {
        *state = action.payload.as_str().map(str::to_string);
    }))
}

fn app_store(config: StoreConfig) -> (AppStore<()>, Arc<Injector<()>>) {
    let statics = [("session".to_string(), session_reducer())];
    let root = RootReducer::new(statics.clone());
    let store = Store::with_config(root.initial_state(), root, (), config);
    let injector = Arc::new(Injector::new(store.clone(), statics));
    (store, injector)
}

// Answers every feed/REQUEST with a feed/SUCCESS carrying the task args
fn feed_loader() -> TaskRef<()> {
    TaskFn::arc("feed-loader", |ctx: TaskContext<()>| async move {
        let mut actions = ctx.subscribe();
        while let Ok(action) = actions.recv().await {
            if action.is("feed/REQUEST") {
                let items = ctx.args().clone();
                if ctx.dispatch(Action::with_payload("feed/SUCCESS", items)).await.is_err() {
                    break;
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

/// Subscribers see actions in dispatch order, after they were reduced
#[tokio::test]
async fn test_subscribers_see_reduced_actions_in_order() {
    let (store, _injector) = app_store(StoreConfig::default());
    let mut first = store.subscribe();
    let mut second = store.subscribe();

    store.send(Action::with_payload("session/SET", json!("a"))).await.unwrap();
    store.send(Action::new("noop")).await.unwrap();

    for receiver in [&mut first, &mut second] {
        assert!(receiver.recv().await.unwrap().is("session/SET"));
        assert!(receiver.recv().await.unwrap().is("noop"));
    }

    let session = store.state(|s| s.slice::<Option<String>>("session")).await;
    assert_eq!(session.as_deref().cloned().flatten().as_deref(), Some("a"));
}

/// Mounting a module hydrates its slice before any of its actions arrive
#[tokio::test]
async fn test_mount_broadcasts_replace_and_hydrates() {
    let (store, injector) = app_store(StoreConfig::default());
    let mut actions = store.subscribe();

    let mount = ModuleScope::new("feed")
        .with_reducer(feed_reducer())
        .mount(&injector)
        .await
        .unwrap();

    assert!(actions.recv().await.unwrap().is(REPLACE_ACTION));
    let feed = store.state(|s| s.slice::<Feed>("feed")).await.unwrap();
    assert!(feed.items.is_empty());
    assert_eq!(feed.requested, 0);

    mount.unmount();
}

/// A module task answers requests until its module is unmounted
#[tokio::test]
async fn test_module_task_round_trip() {
    let (store, injector) = app_store(StoreConfig::default());

    let mount = ModuleScope::new("feed")
        .with_reducer(feed_reducer())
        .with_task(TaskDescriptor::new(feed_loader()))
        .with_args(json!(["a", "b"]))
        .mount(&injector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let success = store
        .send_and_wait_for(
            Action::new("feed/REQUEST"),
            |action| action.is("feed/SUCCESS"),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(success.payload, json!(["a", "b"]));

    let feed = store.state(|s| s.slice::<Feed>("feed")).await.unwrap();
    assert_eq!(feed.items, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(feed.requested, 1);

    drop(mount);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(injector.is_task_done("feed"));

    let result = store
        .send_and_wait_for(
            Action::new("feed/REQUEST"),
            |action| action.is("feed/SUCCESS"),
            Duration::from_millis(50),
        )
        .await;
    assert!(result.is_err());

    // The reducer stays registered after unmount
    let feed = store.state(|s| s.slice::<Feed>("feed")).await.unwrap();
    assert_eq!(feed.requested, 2);
}

/// A daemon keeps answering after its module is gone
#[tokio::test]
async fn test_daemon_outlives_module() {
    let (store, injector) = app_store(StoreConfig::default());

    let mount = ModuleScope::new("feed")
        .with_reducer(feed_reducer())
        .with_task(TaskDescriptor::new(feed_loader()).with_mode(TaskMode::Daemon))
        .with_args(json!(["kept"]))
        .mount(&injector)
        .await
        .unwrap();
    mount.unmount();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(injector.is_task_running("feed"));
    let success = store
        .send_and_wait_for(
            Action::new("feed/REQUEST"),
            |action| action.is("feed/SUCCESS"),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(success.payload, json!(["kept"]));
}

/// A subscriber that falls behind the buffer observes a lag, not a hang
#[tokio::test]
async fn test_lagging_subscriber() {
    let (store, _injector) = app_store(StoreConfig::default().with_broadcast_capacity(2));
    let mut slow = store.subscribe();

    for i in 0..5 {
        store
            .send(Action::with_payload("session/SET", Value::String(i.to_string())))
            .await
            .unwrap();
    }

    match slow.recv().await {
        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => assert_eq!(skipped, 3),
        other => panic!("expected lag, got {other:?}"),
    }
    assert_eq!(slow.recv().await.unwrap().payload, json!("3"));
}

/// Shutdown stops module tasks and rejects new actions
#[tokio::test]
async fn test_shutdown_stops_module_tasks() {
    let (store, injector) = app_store(StoreConfig::default());

    let _mount = ModuleScope::new("feed")
        .with_reducer(feed_reducer())
        .with_task(TaskDescriptor::new(feed_loader()).with_mode(TaskMode::Daemon))
        .mount(&injector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert!(store.send(Action::new("feed/REQUEST")).await.is_err());
    assert!(
        injector
            .inject_task("other", TaskDescriptor::new(feed_loader()), Value::Null)
            .is_err()
    );
}
