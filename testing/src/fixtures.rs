//! Canned records and responses

use serde_json::{Value, json};
use statekit_core::shape::{Shape, predicates};
use statekit_gateway::ApiResponse;
use statekit_gateway::response::STATUS_UNAUTHORIZED;

/// Users have an id and a name
#[must_use]
pub fn user_shape() -> Shape {
    Shape::new()
        .field("id", predicates::is_id)
        .field("name", predicates::is_string)
}

/// A record conforming to [`user_shape`]
#[must_use]
pub fn user(id: u64, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

/// `count` conforming users with ids starting at 1
#[must_use]
pub fn users(count: u64) -> Vec<Value> {
    (1..=count).map(|id| user(id, &format!("user-{id}"))).collect()
}

/// A 200 carrying `payload`
#[must_use]
pub fn ok(payload: Value) -> ApiResponse {
    ApiResponse::success(200, json!({ "payload": payload }))
}

/// A 200 carrying `payload` and a paging total
#[must_use]
pub fn ok_page(payload: Value, total: u64) -> ApiResponse {
    ApiResponse::success(200, json!({ "payload": payload, "paging": { "total": total } }))
}

/// A non-2xx answer with a message
#[must_use]
pub fn server_error(status: u16, message: &str) -> ApiResponse {
    ApiResponse::server_error(status, json!({ "message": message }))
}

/// A 401 answer
#[must_use]
pub fn unauthorized() -> ApiResponse {
    ApiResponse::server_error(STATUS_UNAUTHORIZED, json!({ "message": "Unauthorized" }))
}
