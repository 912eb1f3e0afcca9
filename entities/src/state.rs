//! Slice types held by generated entity reducers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use statekit_core::status::{ErrorInfo, Status};
use std::collections::BTreeMap;

/// State of a list-shaped resource
///
/// Every id in `all` is a key of `entities`. `all` keeps arrival order and may
/// hold the same id twice when the server sent it twice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListState {
    /// Where the last request stands
    pub status: Status,
    /// The last failure, cleared by a new request
    pub error: Option<ErrorInfo>,
    /// Records by id
    pub entities: BTreeMap<String, Value>,
    /// Ids in arrival order
    pub all: Vec<String>,
    /// Server-side total, or the local count when the server sent no paging
    pub total: u64,
}

impl ListState {
    /// Records in `all` order
    ///
    /// Ids without a record are skipped.
    #[must_use]
    pub fn ordered(&self) -> Vec<Value> {
        self.all
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect()
    }

    /// Check that every id in `all` has a record
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.all.iter().all(|id| self.entities.contains_key(id))
    }
}

/// State of a singleton resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectState {
    /// Where the last request stands
    pub status: Status,
    /// The last failure, cleared by a new request
    pub error: Option<ErrorInfo>,
    /// The record, or an empty object before the first success
    pub data: Value,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            status: Status::NotRequested,
            error: None,
            data: Value::Object(Map::new()),
        }
    }
}

/// Status and error of either slice kind
pub(crate) trait EntitySlice {
    fn status(&self) -> Status;
    fn error(&self) -> Option<&ErrorInfo>;
}

impl EntitySlice for ListState {
    fn status(&self) -> Status {
        self.status
    }

    fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }
}

impl EntitySlice for ObjectState {
    fn status(&self) -> Status {
        self.status
    }

    fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }
}

/// The map key for an id value
///
/// Strings are used as is and numbers by their decimal rendering, so `7` and
/// `"7"` address the same record. Anything else is not an id.
#[must_use]
pub fn entity_key(id: &Value) -> Option<String> {
    match id {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
