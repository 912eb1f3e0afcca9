//! Reducer tables generated for an entity
//!
//! | Action      | List slice                              | Singleton slice                 |
//! |-------------|-----------------------------------------|---------------------------------|
//! | `REQUEST`   | `LOADING`, error cleared                | `LOADING`, error cleared        |
//! | `INSERT`    | valid records merged, ids appended      |                                 |
//! | `UPDATE`    | record shallow-merged into its entry    |                                 |
//! | `DELETE`    | record removed from `entities` and `all`|                                 |
//! | `SUCCESS`   |                                         | `data` replaced                 |
//! | `FAILURE`   | `FAILURE` with the payload error        | `FAILURE` with the payload error|
//!
//! Records failing validation are dropped. When nothing usable is left for a
//! single-record action the slice moves to `FAILURE` with an `INTERNAL_ERROR`
//! describing the rejection.

use crate::actions::ActionCreators;
use crate::selectors::EntitySelectors;
use crate::state::{ListState, ObjectState, entity_key};
use serde_json::{Map, Value};
use statekit_core::action::{Action, Verb};
use statekit_core::composition::{ReducerTable, SliceReducer};
use statekit_core::shape::{Shape, ShapeError};
use statekit_core::status::{Envelope, ErrorInfo, FailurePayload, Status};
use std::fmt;
use std::sync::Arc;

/// Transforms a record after it passed validation
pub type Mapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// How loudly rejected records are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Diagnostics {
    /// `debug!` level, for deployed builds
    #[default]
    Quiet,
    /// `warn!` level with the expected shape and the received record
    Verbose,
}

/// Why a reducer refused an action's data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The record does not conform to the shape
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The record has no string or number `id`
    #[error("record has no usable `id`")]
    MissingId,

    /// `INSERT` carried something other than an array
    #[error("received data is not an array")]
    NotAList,

    /// `DELETE` carried no id
    #[error("entity id is missing")]
    MissingDeleteId,

    /// `DELETE` named an id that is not stored
    #[error("no record with id `{0}`")]
    UnknownId(String),
}

/// An entity: its name, the shape its records must have and an optional
/// mapper applied to accepted records
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use statekit_core::composition::SliceReducer;
/// use statekit_core::shape::{Shape, predicates};
/// use statekit_entities::{EntityModel, ListState};
/// use statekit_core::status::Envelope;
///
/// let users = EntityModel::new("users", Shape::new().field("id", predicates::is_id));
/// let reducer = users.list_reducers();
///
/// let mut slice = reducer.initial_slice();
/// let insert = users.actions().insert_entity(Envelope {
///     payload: json!([{ "id": 1 }, { "name": "no id" }]),
///     paging: None,
/// });
/// reducer.reduce_slice(&mut slice, &insert);
///
/// let state = slice.downcast_ref::<ListState>().unwrap();
/// assert_eq!(state.all, vec!["1".to_string()]);
/// assert_eq!(state.total, 1);
/// ```
#[derive(Clone)]
pub struct EntityModel {
    name: String,
    shape: Shape,
    mapper: Option<Mapper>,
    diagnostics: Diagnostics,
}

impl EntityModel {
    /// An entity whose records must conform to `shape`
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            mapper: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Apply `mapper` to every accepted record
    #[must_use]
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Set how rejected records are reported
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The entity name, also its action namespace
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action creators for this entity
    #[must_use]
    pub fn actions(&self) -> ActionCreators {
        ActionCreators::new(self.name.clone())
    }

    /// Selectors reading this entity from the top level of the state
    #[must_use]
    pub fn selectors(&self) -> EntitySelectors {
        EntitySelectors::new(self.name.clone())
    }

    /// Validate then map one record
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Shape`] when the record does not conform.
    pub fn accept(&self, record: &Value) -> Result<Value, RecordError> {
        self.shape.check(record)?;
        Ok(match &self.mapper {
            Some(mapper) => mapper(record.clone()),
            None => record.clone(),
        })
    }

    /// Reducers for a list-shaped resource
    #[must_use]
    pub fn list_reducers(&self) -> ReducerTable<ListState> {
        let (insert, update, delete) = (self.clone(), self.clone(), self.clone());

        ReducerTable::<ListState>::new()
            .on(self.action_type(Verb::Request), |state, _| {
                state.status = Status::Loading;
                state.error = None;
            })
            .on(self.action_type(Verb::Failure), |state, action| {
                state.status = Status::Failure;
                state.error = Some(failure_error(action));
            })
            .on(self.action_type(Verb::Insert), move |state, action| {
                insert.insert(state, action);
            })
            .on(self.action_type(Verb::Update), move |state, action| {
                update.update(state, action);
            })
            .on(self.action_type(Verb::Delete), move |state, action| {
                delete.delete(state, action);
            })
    }

    /// Reducers for a singleton resource
    #[must_use]
    pub fn object_reducers(&self) -> ReducerTable<ObjectState> {
        let success = self.clone();

        ReducerTable::<ObjectState>::new()
            .on(self.action_type(Verb::Request), |state, _| {
                state.status = Status::Loading;
                state.error = None;
            })
            .on(self.action_type(Verb::Success), move |state, action| {
                success.replace(state, action);
            })
            .on(self.action_type(Verb::Failure), |state, action| {
                state.status = Status::Failure;
                state.error = Some(failure_error(action));
            })
    }

    /// [`Self::list_reducers`] ready for a registry
    #[must_use]
    pub fn list_slice(&self) -> Arc<dyn SliceReducer> {
        Arc::new(self.list_reducers())
    }

    /// [`Self::object_reducers`] ready for a registry
    #[must_use]
    pub fn object_slice(&self) -> Arc<dyn SliceReducer> {
        Arc::new(self.object_reducers())
    }

    fn action_type(&self, verb: Verb) -> statekit_core::action::ActionType {
        Action::type_of(&self.name, verb)
    }

    fn insert(&self, state: &mut ListState, action: &Action) {
        let Ok(Envelope {
            payload: Value::Array(records),
            paging,
        }) = action.payload_as::<Envelope>()
        else {
            self.fail(&mut state.status, &mut state.error, &RecordError::NotAList);
            return;
        };

        for record in &records {
            match self.accept(record).and_then(keyed) {
                Ok((id, accepted)) => {
                    state.entities.insert(id.clone(), accepted);
                    state.all.push(id);
                },
                Err(error) => self.report(&error, Some(record)),
            }
        }

        let local = u64::try_from(state.all.len()).unwrap_or(u64::MAX);
        state.total = paging.and_then(|paging| paging.total).unwrap_or(local);
        state.status = Status::Success;
    }

    fn update(&self, state: &mut ListState, action: &Action) {
        let (id, record) = match self.accept(&action.payload).and_then(keyed) {
            Ok(accepted) => accepted,
            Err(error) => {
                self.report(&error, Some(&action.payload));
                self.fail(&mut state.status, &mut state.error, &error);
                return;
            },
        };

        let entry = state
            .entities
            .entry(id)
            .or_insert_with(|| Value::Object(Map::new()));
        match (entry, record) {
            (Value::Object(existing), Value::Object(fields)) => existing.extend(fields),
            (entry, record) => *entry = record,
        }
        state.status = Status::Success;
    }

    fn delete(&self, state: &mut ListState, action: &Action) {
        let Some(id) = action.payload.get("id").and_then(entity_key) else {
            self.fail(&mut state.status, &mut state.error, &RecordError::MissingDeleteId);
            return;
        };

        if state.entities.remove(&id).is_none() {
            self.fail(&mut state.status, &mut state.error, &RecordError::UnknownId(id));
            return;
        }

        state.all.retain(|known| known != &id);
        state.status = Status::Success;
    }

    fn replace(&self, state: &mut ObjectState, action: &Action) {
        let record = action.payload.get("payload").unwrap_or(&Value::Null);

        match self.accept(record) {
            Ok(data) => {
                state.data = data;
                state.status = Status::Success;
            },
            Err(error) => {
                self.report(&error, Some(record));
                self.fail(&mut state.status, &mut state.error, &error);
            },
        }
    }

    fn report(&self, error: &RecordError, received: Option<&Value>) {
        metrics::counter!("entities.records.dropped", "entity" => self.name.clone()).increment(1);

        match self.diagnostics {
            Diagnostics::Verbose => tracing::warn!(
                entity = %self.name,
                %error,
                expected = ?self.shape,
                received = ?received,
                "Received record does not conform to the expected shape"
            ),
            Diagnostics::Quiet => tracing::debug!(entity = %self.name, %error, "Record dropped"),
        }
    }

    fn fail(&self, status: &mut Status, slot: &mut Option<ErrorInfo>, error: &RecordError) {
        match self.diagnostics {
            Diagnostics::Verbose => tracing::warn!(entity = %self.name, %error, "Entity update failed"),
            Diagnostics::Quiet => tracing::debug!(entity = %self.name, %error, "Entity update failed"),
        }
        *status = Status::Failure;
        *slot = Some(ErrorInfo::internal(format!("{}: {error}", self.name)));
    }
}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("mapper", &self.mapper.is_some())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

fn keyed(record: Value) -> Result<(String, Value), RecordError> {
    let id = record
        .get("id")
        .and_then(entity_key)
        .ok_or(RecordError::MissingId)?;
    Ok((id, record))
}

// Absent fields become empty strings
fn failure_error(action: &Action) -> ErrorInfo {
    action
        .payload_as::<FailurePayload>()
        .map(|payload| payload.error)
        .unwrap_or_default()
}
