//! Action creators for one entity

use serde_json::{Value, json};
use statekit_core::action::{Action, ActionType, Verb};
use statekit_core::status::{Envelope, ErrorInfo};

/// Builds the `"<entity>/<VERB>"` actions the generated reducers handle
///
/// # Example
///
/// ```
/// use statekit_entities::ActionCreators;
/// use serde_json::json;
///
/// let users = ActionCreators::new("users");
/// let action = users.delete_entity(json!(7));
/// assert!(action.is("users/DELETE"));
/// assert_eq!(action.payload, json!({ "id": 7 }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCreators {
    entity: String,
}

impl ActionCreators {
    /// Creators for `entity`
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
        }
    }

    /// The entity namespace
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The action type for `verb`
    #[must_use]
    pub fn action_type(&self, verb: Verb) -> ActionType {
        Action::type_of(&self.entity, verb)
    }

    /// A fetch started
    #[must_use]
    pub fn request(&self) -> Action {
        Action::new(self.action_type(Verb::Request))
    }

    /// A singleton fetch returned `envelope`
    #[must_use]
    pub fn success(&self, envelope: Envelope) -> Action {
        Action::with_payload(self.action_type(Verb::Success), envelope_payload(envelope))
    }

    /// A fetch failed with `error`
    #[must_use]
    pub fn failure(&self, error: ErrorInfo) -> Action {
        Action::with_payload(self.action_type(Verb::Failure), json!({ "error": error }))
    }

    /// A list fetch returned `envelope`
    #[must_use]
    pub fn insert_entity(&self, envelope: Envelope) -> Action {
        Action::with_payload(self.action_type(Verb::Insert), envelope_payload(envelope))
    }

    /// One record changed
    #[must_use]
    pub fn update_entity(&self, record: Value) -> Action {
        Action::with_payload(self.action_type(Verb::Update), record)
    }

    /// The record with `id` is gone
    #[must_use]
    pub fn delete_entity(&self, id: impl Into<Value>) -> Action {
        Action::with_payload(self.action_type(Verb::Delete), json!({ "id": id.into() }))
    }
}

fn envelope_payload(envelope: Envelope) -> Value {
    let Envelope { payload, paging } = envelope;
    match paging {
        Some(paging) => json!({ "payload": payload, "paging": paging }),
        None => json!({ "payload": payload }),
    }
}
