//! String-typed actions
//!
//! Actions are addressed by a plain string type so that any dispatcher that
//! emits `"<entity>/<VERB>"` interacts with the generated reducers directly.
//! [`Verb`] and [`ActionType::for_entity`] keep the common case typed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The fixed set of transitions every entity supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    /// A fetch started
    Request,
    /// A singleton fetch succeeded
    Success,
    /// A fetch failed
    Failure,
    /// Records were appended to a collection
    Insert,
    /// One record of a collection changed
    Update,
    /// One record was removed from a collection
    Delete,
}

impl Verb {
    /// All verbs, in declaration order
    pub const ALL: [Self; 6] = [
        Self::Request,
        Self::Success,
        Self::Failure,
        Self::Insert,
        Self::Update,
        Self::Delete,
    ];

    /// The upper-case suffix used in action type strings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// Returned when a suffix is not one of the [`Verb`] strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action verb: {0}")]
pub struct UnknownVerb(pub String);

/// The `type` of an action, e.g. `"users/INSERT"` or `"auth/LOGOUT"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(String);

impl ActionType {
    /// Wrap an arbitrary action type string
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self(action_type.into())
    }

    /// Build the `"<entity>/<VERB>"` type for an entity transition
    #[must_use]
    pub fn for_entity(entity: &str, verb: Verb) -> Self {
        Self(format!("{entity}/{verb}"))
    }

    /// The raw type string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace before the last `/`, if any
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(namespace, _)| namespace)
    }

    /// The entity verb after the last `/`, if it is one
    #[must_use]
    pub fn verb(&self) -> Option<Verb> {
        self.0
            .rsplit_once('/')
            .and_then(|(_, suffix)| suffix.parse().ok())
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An action: a type plus an arbitrary JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// What happened
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Data carried by the action (`null` when absent)
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Create an action without payload
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Value::Null,
        }
    }

    /// Create an action carrying a payload
    #[must_use]
    pub fn with_payload(action_type: impl Into<ActionType>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            payload,
        }
    }

    /// Shorthand for [`ActionType::for_entity`]
    #[must_use]
    pub fn type_of(entity: &str, verb: Verb) -> ActionType {
        ActionType::for_entity(entity, verb)
    }

    /// Check the action type against a type string
    #[must_use]
    pub fn is(&self, action_type: &str) -> bool {
        self.action_type.as_str() == action_type
    }

    /// Deserialize the payload into a typed shape
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload does not have the expected shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_action_type_format() {
        let action_type = ActionType::for_entity("users", Verb::Insert);
        assert_eq!(action_type.as_str(), "users/INSERT");
        assert_eq!(action_type.namespace(), Some("users"));
        assert_eq!(action_type.verb(), Some(Verb::Insert));
    }

    #[test]
    fn test_namespaced_entity_keeps_inner_slashes() {
        let action_type = ActionType::for_entity("admin/users", Verb::Delete);
        assert_eq!(action_type.namespace(), Some("admin/users"));
        assert_eq!(action_type.verb(), Some(Verb::Delete));
    }

    #[test]
    fn test_non_entity_type_has_no_verb() {
        let action_type = ActionType::new("auth/LOGOUT");
        assert_eq!(action_type.namespace(), Some("auth"));
        assert_eq!(action_type.verb(), None);
        assert_eq!(ActionType::new("ping").namespace(), None);
    }

    #[test]
    fn test_verb_round_trips_through_str() {
        for verb in Verb::ALL {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
        assert!("request".parse::<Verb>().is_err());
    }

    #[test]
    fn test_action_wire_format() {
        let action = Action::with_payload("users/DELETE", json!({ "id": "7" }));
        let wire = serde_json::to_value(&action).unwrap();
        assert_eq!(wire, json!({ "type": "users/DELETE", "payload": { "id": "7" } }));

        let parsed: Action = serde_json::from_value(json!({ "type": "users/REQUEST" })).unwrap();
        assert!(parsed.is("users/REQUEST"));
        assert_eq!(parsed.payload, Value::Null);
    }
}
