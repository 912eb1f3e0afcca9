//! Record shape validation
//!
//! A [`Shape`] maps field names to predicates. A record conforms when it is a
//! JSON object and every predicate accepts the corresponding field. A field
//! that is absent from the record fails its predicate, even a permissive one.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A field predicate
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// The record is not a JSON object
    #[error("expected an object, received {0}")]
    NotAnObject(&'static str),

    /// A field required by the shape is absent
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field is present but its predicate rejected it
    #[error("field `{0}` has an unexpected value")]
    RejectedField(String),
}

/// Field name → predicate mapping
#[derive(Clone, Default)]
pub struct Shape {
    fields: BTreeMap<String, Predicate>,
}

impl Shape {
    /// An empty shape; every object conforms to it
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field check
    #[must_use]
    pub fn field<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.fields.insert(name.into(), Arc::new(predicate));
        self
    }

    /// Field names covered by this shape
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Validate a record, reporting the first failing field
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] describing the first field that does not conform.
    pub fn check(&self, record: &Value) -> Result<(), ShapeError> {
        let Value::Object(object) = record else {
            return Err(ShapeError::NotAnObject(kind_of(record)));
        };

        for (name, predicate) in &self.fields {
            match object.get(name) {
                None => return Err(ShapeError::MissingField(name.clone())),
                Some(value) if !predicate(value) => {
                    return Err(ShapeError::RejectedField(name.clone()));
                },
                Some(_) => {},
            }
        }

        Ok(())
    }

    /// Check whether a record conforms
    #[must_use]
    pub fn conforms(&self, record: &Value) -> bool {
        self.check(record).is_ok()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fields.keys()).finish()
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ready-made predicates
pub mod predicates {
    use serde_json::Value;

    /// Accepts any present value
    #[must_use]
    pub fn any(_: &Value) -> bool {
        true
    }

    /// Accepts strings
    #[must_use]
    pub fn is_string(value: &Value) -> bool {
        value.is_string()
    }

    /// Accepts numbers
    #[must_use]
    pub fn is_number(value: &Value) -> bool {
        value.is_number()
    }

    /// Accepts booleans
    #[must_use]
    pub fn is_bool(value: &Value) -> bool {
        value.is_boolean()
    }

    /// Accepts arrays
    #[must_use]
    pub fn is_array(value: &Value) -> bool {
        value.is_array()
    }

    /// Accepts objects
    #[must_use]
    pub fn is_object(value: &Value) -> bool {
        value.is_object()
    }

    /// Accepts identifiers: strings or numbers
    #[must_use]
    pub fn is_id(value: &Value) -> bool {
        value.is_string() || value.is_number()
    }

    /// Wraps a predicate so that `null` is accepted too
    pub fn nullable<F>(predicate: F) -> impl Fn(&Value) -> bool + Send + Sync + 'static
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        move |value: &Value| value.is_null() || predicate(value)
    }
}
