//! The normalized response every gateway call resolves to

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use statekit_core::status::{Envelope, ErrorInfo, Paging};

/// HTTP status of a request that was sent but got no usable response
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// HTTP status of a request that could not be built
pub const STATUS_INTERNAL_ERROR: u16 = 418;

/// HTTP status the session layer reacts to
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Outcome of one gateway call
///
/// Server fields are merged on top of the gateway's own (`ok`, `status`,
/// `messageKey`), so a body carrying `status` or `messageKey` wins. Unknown
/// server fields are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// `true` only for 2xx responses
    #[serde(default)]
    pub ok: bool,
    /// HTTP status, or 503/418 for transport and construction failures
    #[serde(default)]
    pub status: u16,
    /// Error message key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
    /// Human-readable message from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response data
    #[serde(default)]
    pub payload: Value,
    /// Server metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Paging information for list endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    /// Any other top-level server field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResponse {
    /// A 2xx response carrying `body`
    #[must_use]
    pub fn success(status: u16, body: Value) -> Self {
        let defaults = Self {
            ok: true,
            status,
            ..Self::default()
        };
        defaults.merged_with(body)
    }

    /// A non-2xx response carrying `body`
    #[must_use]
    pub fn server_error(status: u16, body: Value) -> Self {
        let defaults = Self {
            status,
            message_key: Some(statekit_core::status::message_keys::SERVER_ERROR.to_string()),
            ..Self::default()
        };
        defaults.merged_with(body)
    }

    /// A failure produced by the gateway itself
    #[must_use]
    pub fn failure(status: u16, message_key: &str) -> Self {
        Self {
            status,
            message_key: Some(message_key.to_string()),
            ..Self::default()
        }
    }

    /// Check whether the server answered 401
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    /// The error as reducers store it; absent fields become empty strings
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(
            self.message_key.clone().unwrap_or_default(),
            self.message.clone().unwrap_or_default(),
        )
    }

    /// The `{ payload, paging }` pair a successful fetch forwards
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        Envelope {
            payload: self.payload.clone(),
            paging: self.paging.clone(),
        }
    }

    // Object bodies are spread over the defaults one field at a time, so a
    // mistyped field is dropped without taking the rest of the body with it.
    // Anything else lands in `payload`.
    fn merged_with(mut self, body: Value) -> Self {
        let fields = match body {
            Value::Object(fields) => fields,
            Value::Null => return self,
            other => {
                self.payload = other;
                return self;
            },
        };

        for (name, value) in fields {
            if !KNOWN_FIELDS.contains(&name.as_str()) {
                self.extra.insert(name, value);
                continue;
            }
            if !self.apply_field(&name, value) {
                tracing::warn!(field = %name, "Response field has an unexpected type, ignored");
            }
        }
        self
    }

    // Returns false when `value` does not fit the field
    fn apply_field(&mut self, name: &str, value: Value) -> bool {
        match (name, value) {
            ("ok", Value::Bool(ok)) => self.ok = ok,
            ("status", Value::Number(status)) => {
                let Some(status) = status.as_u64().and_then(|s| u16::try_from(s).ok()) else {
                    return false;
                };
                self.status = status;
            },
            ("messageKey", Value::String(key)) => self.message_key = Some(key),
            ("messageKey", Value::Null) => self.message_key = None,
            ("message", Value::String(message)) => self.message = Some(message),
            ("message", Value::Null) => self.message = None,
            ("payload", payload) => self.payload = payload,
            ("metadata", Value::Null) => self.metadata = None,
            ("metadata", metadata) => self.metadata = Some(metadata),
            ("paging", Value::Object(paging)) => self.paging = Some(lenient_paging(paging)),
            ("paging", Value::Null) => self.paging = None,
            _ => return false,
        }
        true
    }
}

const KNOWN_FIELDS: [&str; 7] = [
    "ok",
    "status",
    "messageKey",
    "message",
    "payload",
    "metadata",
    "paging",
];

// A `total` that is not a count is dropped; other paging fields pass through
fn lenient_paging(mut fields: Map<String, Value>) -> Paging {
    let total = match fields.remove("total") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let total = value.as_u64();
            if total.is_none() {
                tracing::warn!(%value, "Paging total is not a count, ignored");
            }
            total
        },
    };
    Paging { total, extra: fields }
}
