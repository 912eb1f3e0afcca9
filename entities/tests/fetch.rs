//! Fetch tasks driven through the injector against a scripted gateway

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use serde_json::json;
use statekit_core::status::{Status, message_keys};
use statekit_entities::{EntityModel, FetchTask, ResourceKind, UNAUTHORIZED};
use statekit_gateway::{ApiResponse, HttpGateway, RequestParams};
use statekit_runtime::{AppStore, Injector, ModuleScope, TaskDescriptor};
use statekit_testing::{MockGateway, fixtures, helpers};
use std::sync::Arc;
use std::time::Duration;

type Env = Arc<dyn HttpGateway>;

const WAIT: Duration = Duration::from_secs(1);

fn users() -> EntityModel {
    EntityModel::new("users", fixtures::user_shape())
}

fn setup(gateway: &Arc<MockGateway>) -> (AppStore<Env>, Arc<Injector<Env>>) {
    let env: Env = Arc::clone(gateway) as Arc<dyn HttpGateway>;
    helpers::app_store(Vec::new(), env)
}

fn users_module(model: &EntityModel) -> ModuleScope<Env> {
    ModuleScope::new("users")
        .with_reducer(model.list_slice())
        .with_task(TaskDescriptor::new(
            FetchTask::new("users", ResourceKind::List, RequestParams::endpoint("/users")).into_ref(),
        ))
}

#[tokio::test]
async fn test_list_fetch_inserts_valid_records() {
    let mut records = fixtures::users(3);
    records.push(json!({ "id": 99 }));
    let gateway = Arc::new(MockGateway::new().respond_with(fixtures::ok_page(json!(records), 42)));
    let (store, injector) = setup(&gateway);
    let model = users();
    let mut actions = store.subscribe();

    let _mount = users_module(&model).mount(&injector).await.unwrap();

    let seen = helpers::types_until(&mut actions, |a| a.is("users/INSERT"), WAIT).await;
    assert_eq!(seen, vec!["@@statekit/REPLACE", "users/REQUEST", "users/INSERT"]);

    let selectors = model.selectors();
    let (status, total, all) = store
        .state(|s| (selectors.status(s), selectors.total(s), selectors.all(s)))
        .await;
    assert_eq!(status, Status::Success);
    assert_eq!(total, 42);
    assert_eq!(all.len(), 3);
    assert_eq!(gateway.requests()[0].target(), "/users");
}

#[tokio::test]
async fn test_mistyped_paging_total_still_inserts() {
    let body = json!({ "payload": fixtures::users(2), "paging": { "total": "42" } });
    let gateway = Arc::new(MockGateway::new().respond_with(ApiResponse::success(200, body)));
    let (store, injector) = setup(&gateway);
    let model = users();
    let mut actions = store.subscribe();

    let _mount = users_module(&model).mount(&injector).await.unwrap();
    helpers::next_matching(&mut actions, |a| a.is("users/INSERT"), WAIT)
        .await
        .expect("insert dispatched");

    let selectors = model.selectors();
    let (status, total, all) = store
        .state(|s| (selectors.status(s), selectors.total(s), selectors.all(s)))
        .await;
    assert_eq!(status, Status::Success);
    // Falls back to the local count
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_object_fetch_replaces_data() {
    let gateway = Arc::new(MockGateway::new().respond_with(fixtures::ok(fixtures::user(1, "Ada"))));
    let (store, injector) = setup(&gateway);
    let model = EntityModel::new("me", fixtures::user_shape());
    let mut actions = store.subscribe();

    let _mount = ModuleScope::new("me")
        .with_reducer(model.object_slice())
        .with_task(TaskDescriptor::new(
            FetchTask::new("me", ResourceKind::Object, RequestParams::endpoint("/me")).into_ref(),
        ))
        .mount(&injector)
        .await
        .unwrap();

    helpers::next_matching(&mut actions, |a| a.is("me/SUCCESS"), WAIT)
        .await
        .expect("success dispatched");

    let selectors = model.selectors();
    let data = store.state(|s| selectors.data(s)).await;
    assert_eq!(*data, fixtures::user(1, "Ada"));
}

#[tokio::test]
async fn test_server_error_becomes_failure() {
    let gateway = Arc::new(MockGateway::new().respond_with(fixtures::server_error(500, "x")));
    let (store, injector) = setup(&gateway);
    let model = users();
    let mut actions = store.subscribe();

    let _mount = users_module(&model).mount(&injector).await.unwrap();
    helpers::next_matching(&mut actions, |a| a.is("users/FAILURE"), WAIT)
        .await
        .expect("failure dispatched");

    let error = store.state(|s| model.selectors().error(s)).await.unwrap();
    assert_eq!(error.message_key, message_keys::SERVER_ERROR);
    assert_eq!(error.message, "x");
}

#[tokio::test]
async fn test_unauthorized_is_announced_after_failure() {
    let gateway = Arc::new(MockGateway::new().respond_with(fixtures::unauthorized()));
    let (store, injector) = setup(&gateway);
    let mut actions = store.subscribe();

    let _mount = users_module(&users()).mount(&injector).await.unwrap();

    let seen = helpers::types_until(&mut actions, |a| a.is(UNAUTHORIZED), WAIT).await;
    assert_eq!(
        seen,
        vec!["@@statekit/REPLACE", "users/REQUEST", "users/FAILURE", UNAUTHORIZED]
    );
}

#[tokio::test]
async fn test_unmount_during_call_dispatches_nothing_more() {
    let gateway = Arc::new(
        MockGateway::new()
            .with_delay(Duration::from_millis(200))
            .respond_with(fixtures::ok(json!(fixtures::users(1)))),
    );
    let (store, injector) = setup(&gateway);
    let model = users();
    let mut actions = store.subscribe();

    let mount = users_module(&model).mount(&injector).await.unwrap();
    helpers::next_matching(&mut actions, |a| a.is("users/REQUEST"), WAIT)
        .await
        .expect("request dispatched");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gateway.calls(), 1);

    mount.unmount();

    let late = helpers::next_matching(&mut actions, |a| a.is("users/INSERT"), Duration::from_millis(400)).await;
    assert!(late.is_none());
    assert_eq!(store.state(|s| model.selectors().status(s)).await, Status::Loading);
}

#[tokio::test]
async fn test_remount_fetches_again_with_args() {
    let gateway = Arc::new(
        MockGateway::new()
            .respond_with(fixtures::ok(json!(fixtures::users(1))))
            .respond_with(fixtures::ok(json!([fixtures::user(2, "b")]))),
    );
    let (store, injector) = setup(&gateway);
    let model = users();
    let module = || users_module(&model).with_args(json!({ "page": 2 }));
    let mut actions = store.subscribe();

    let first = module().mount(&injector).await.unwrap();
    helpers::next_matching(&mut actions, |a| a.is("users/INSERT"), WAIT).await.unwrap();
    drop(first);

    let _second = module().mount(&injector).await.unwrap();
    helpers::next_matching(&mut actions, |a| a.is("users/INSERT"), WAIT).await.unwrap();

    assert_eq!(gateway.calls(), 2);
    for request in gateway.requests() {
        assert_eq!(request.query_pairs(), vec![("page".to_string(), "2".to_string())]);
    }

    // The slice survives remounts, so the second page is appended
    let all = store.state(|s| model.selectors().all(s)).await;
    assert_eq!(all.len(), 2);
}
