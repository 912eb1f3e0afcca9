//! Outgoing request description

use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything needed to issue one call through the gateway
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestParams {
    /// Explicit HTTP method; derived from `params`/`data` when absent
    pub method: Option<Method>,
    /// Path relative to the API root (takes precedence over `url`)
    pub endpoint: Option<String>,
    /// Alternative to `endpoint`, may be absolute
    pub url: Option<String>,
    /// Query parameters; arrays are sent comma-joined
    pub params: BTreeMap<String, Value>,
    /// JSON body
    pub data: Option<Value>,
    /// Extra headers; they override the defaults
    pub headers: BTreeMap<String, String>,
    /// Skip the `Authorization` header
    pub no_auth: bool,
}

impl RequestParams {
    /// A request to `endpoint` with everything else defaulted
    #[must_use]
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// A request to a full or relative `url`
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Builder: Set an explicit method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Builder: Add a query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Builder: Set the JSON body
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builder: Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder: Do not send the bearer token
    #[must_use]
    pub const fn without_auth(mut self) -> Self {
        self.no_auth = true;
        self
    }

    /// The path or URL this request targets (`endpoint` first, then `url`)
    #[must_use]
    pub fn target(&self) -> &str {
        self.endpoint
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or_default()
    }

    /// The method that will be used
    ///
    /// An explicit method wins. Otherwise a request with a non-empty body and
    /// no query parameters is a POST, anything else a GET.
    #[must_use]
    pub fn resolved_method(&self) -> Method {
        if let Some(method) = &self.method {
            return method.clone();
        }

        let has_body = self.data.as_ref().is_some_and(is_non_empty);
        if self.params.is_empty() && has_body {
            Method::POST
        } else {
            Method::GET
        }
    }

    /// Query pairs as they go on the wire
    ///
    /// Arrays are joined with commas, `null` parameters are left out.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), render_param(value)))
            .collect()
    }
}

fn is_non_empty(data: &Value) -> bool {
    match data {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(text) => !text.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn render_param(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(render_scalar).collect::<Vec<_>>().join(","),
        other => render_scalar(other),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
