//! Request status and the payload shapes shared by reducers and the gateway

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle of a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Nothing was requested yet
    #[default]
    NotRequested,
    /// A request is in flight
    Loading,
    /// The last request succeeded
    Success,
    /// The last request failed
    Failure,
}

impl Status {
    /// Check if a request is in flight
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Check if the last request failed
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequested => write!(f, "NOT_REQUESTED"),
            Self::Loading => write!(f, "LOADING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Message keys produced locally (the backend may send others)
pub mod message_keys {
    /// Non-2xx answer from the backend
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    /// Request sent, no answer received
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    /// Request could not be built, or received data was malformed
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Error stored in a slice after a failure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Translation key for the error
    #[serde(default)]
    pub message_key: String,
    /// Human readable detail, possibly empty
    #[serde(default)]
    pub message: String,
}

impl ErrorInfo {
    /// Create an error with a key and a message
    #[must_use]
    pub fn new(message_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_key: message_key.into(),
            message: message.into(),
        }
    }

    /// An `INTERNAL_ERROR` with the given detail
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message_keys::INTERNAL_ERROR, message)
    }
}

/// Paging metadata returned by list endpoints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Paging {
    /// Total number of records on the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    /// Any other paging fields, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Paging {
    /// Paging with only a total
    #[must_use]
    pub fn with_total(total: u64) -> Self {
        Self {
            total: Some(total),
            extra: Map::new(),
        }
    }
}

/// Payload of `INSERT` and `SUCCESS`: the data plus optional paging
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// The received data
    #[serde(default)]
    pub payload: Value,
    /// Paging metadata, when the endpoint is paged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

/// Payload of `FAILURE`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailurePayload {
    /// What went wrong
    #[serde(default)]
    pub error: ErrorInfo,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(Status::NotRequested).unwrap(), json!("NOT_REQUESTED"));
        assert_eq!(Status::Loading.to_string(), "LOADING");
        assert_eq!(Status::default(), Status::NotRequested);
    }

    #[test]
    fn test_failure_payload_defaults_missing_fields() {
        let payload: FailurePayload =
            serde_json::from_value(json!({ "error": { "messageKey": "SERVER_ERROR" } })).unwrap();
        assert_eq!(payload.error, ErrorInfo::new("SERVER_ERROR", ""));

        let empty: FailurePayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.error, ErrorInfo::default());
    }

    #[test]
    fn test_paging_keeps_unknown_fields() {
        let paging: Paging =
            serde_json::from_value(json!({ "total": 42, "page": 2, "perPage": 10 })).unwrap();
        assert_eq!(paging.total, Some(42));
        assert_eq!(paging.extra.get("page"), Some(&json!(2)));
    }
}
