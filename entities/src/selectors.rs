//! Memoized projections of an entity slice
//!
//! Each projection caches its last result against the slice `Arc` it was
//! computed from. Reducers replace a slice whenever they handle an action, so
//! an unchanged pointer means an unchanged result and the cached value (for
//! `Arc` results, the very same allocation) is returned.

use crate::state::{EntitySlice, ListState, ObjectState, entity_key};
use serde::Serialize;
use serde_json::{Map, Value};
use statekit_core::memo::Memo;
use statekit_core::state::{AppState, Slice};
use statekit_core::status::{ErrorInfo, Status};
use std::sync::Arc;

/// Everything a list screen renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    /// Where the last request stands
    pub status: Status,
    /// The last failure, if any
    pub error: Option<ErrorInfo>,
    /// Records in arrival order
    pub entities: Arc<Vec<Value>>,
    /// Server-side or local total
    pub total: u64,
}

/// Selectors for one entity
///
/// The entity slice is read from `state[entity]`, or from
/// `state[substate][entity]` when the entity lives in a nested combined slice.
/// Missing slices yield the defaults of a never requested resource.
#[derive(Debug)]
pub struct EntitySelectors {
    entity: String,
    substate: Option<String>,
    status: Memo<Status>,
    error: Memo<Option<ErrorInfo>>,
    data: Memo<Arc<Value>>,
    all: Memo<Arc<Vec<Value>>>,
    total: Memo<u64>,
    list: Memo<Arc<ListView>>,
}

impl EntitySelectors {
    /// Selectors for a top-level `entity` slice
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            substate: None,
            status: Memo::new(),
            error: Memo::new(),
            data: Memo::new(),
            all: Memo::new(),
            total: Memo::new(),
            list: Memo::new(),
        }
    }

    /// Read the entity from inside the `substate` slice
    #[must_use]
    pub fn within(mut self, substate: impl Into<String>) -> Self {
        self.substate = Some(substate.into());
        self
    }

    /// The raw entity slice
    #[must_use]
    pub fn select(&self, state: &AppState) -> Option<Slice> {
        match &self.substate {
            Some(substate) => state.lookup(&[substate.as_str(), self.entity.as_str()]),
            None => state.get(&self.entity).cloned(),
        }
    }

    /// Request status, `NOT_REQUESTED` when absent
    #[must_use]
    pub fn status(&self, state: &AppState) -> Status {
        let slice = self.select(state);
        self.status.get_or_compute(slice.as_ref(), |slice| {
            as_entity(slice).map(|entity| entity.status()).unwrap_or_default()
        })
    }

    /// The last failure
    #[must_use]
    pub fn error(&self, state: &AppState) -> Option<ErrorInfo> {
        let slice = self.select(state);
        self.error.get_or_compute(slice.as_ref(), error_of)
    }

    /// Singleton data, an empty object when absent
    #[must_use]
    pub fn data(&self, state: &AppState) -> Arc<Value> {
        let slice = self.select(state);
        self.data.get_or_compute(slice.as_ref(), |slice| {
            Arc::new(
                slice
                    .and_then(|slice| slice.downcast_ref::<ObjectState>())
                    .map_or_else(|| Value::Object(Map::new()), |object| object.data.clone()),
            )
        })
    }

    /// One list record
    #[must_use]
    pub fn by_id(&self, state: &AppState, id: &Value) -> Option<Value> {
        let key = entity_key(id)?;
        let slice = self.select(state)?;
        list_of(Some(&slice))?.entities.get(&key).cloned()
    }

    /// List records in arrival order
    #[must_use]
    pub fn all(&self, state: &AppState) -> Arc<Vec<Value>> {
        let slice = self.select(state);
        self.all.get_or_compute(slice.as_ref(), all_of)
    }

    /// List total, 0 when absent
    #[must_use]
    pub fn total(&self, state: &AppState) -> u64 {
        let slice = self.select(state);
        self.total
            .get_or_compute(slice.as_ref(), |slice| list_of(slice).map_or(0, |list| list.total))
    }

    /// Status, error, records and total together
    #[must_use]
    pub fn list_view(&self, state: &AppState) -> Arc<ListView> {
        let slice = self.select(state);
        self.list.get_or_compute(slice.as_ref(), |slice| {
            Arc::new(ListView {
                status: as_entity(slice).map(|entity| entity.status()).unwrap_or_default(),
                error: error_of(slice),
                entities: self.all.get_or_compute(slice, all_of),
                total: list_of(slice).map_or(0, |list| list.total),
            })
        })
    }
}

fn as_entity(slice: Option<&Slice>) -> Option<&dyn EntitySlice> {
    let slice = slice?;
    if let Some(list) = slice.downcast_ref::<ListState>() {
        return Some(list as &dyn EntitySlice);
    }
    slice
        .downcast_ref::<ObjectState>()
        .map(|object| object as &dyn EntitySlice)
}

fn list_of(slice: Option<&Slice>) -> Option<&ListState> {
    slice?.downcast_ref::<ListState>()
}

fn error_of(slice: Option<&Slice>) -> Option<ErrorInfo> {
    as_entity(slice).and_then(|entity| entity.error().cloned())
}

fn all_of(slice: Option<&Slice>) -> Arc<Vec<Value>> {
    Arc::new(list_of(slice).map(ListState::ordered).unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::EntityModel;
    use serde_json::json;
    use statekit_core::composition::{RootReducer, SliceReducer};
    use statekit_core::shape::{Shape, predicates};
    use statekit_core::status::{Envelope, Paging};

    fn users() -> EntityModel {
        EntityModel::new("users", Shape::new().field("id", predicates::is_id))
    }

    fn root(model: &EntityModel) -> RootReducer {
        RootReducer::new([("users".to_string(), model.list_slice())])
    }

    #[test]
    fn test_defaults_for_missing_slice() {
        let selectors = EntitySelectors::new("users");
        let state = AppState::new();

        assert_eq!(selectors.status(&state), Status::NotRequested);
        assert_eq!(selectors.error(&state), None);
        assert_eq!(*selectors.data(&state), json!({}));
        assert!(selectors.all(&state).is_empty());
        assert_eq!(selectors.total(&state), 0);
        assert_eq!(selectors.by_id(&state, &json!(1)), None);
    }

    #[test]
    fn test_list_projection() {
        let model = users();
        let root = root(&model);
        let mut state = root.initial_state();
        root.reduce_state(
            &mut state,
            &model.actions().insert_entity(Envelope {
                payload: json!([{ "id": 2 }, { "id": 1 }, { "bad": true }]),
                paging: Some(Paging::with_total(42)),
            }),
        );

        let selectors = model.selectors();
        assert_eq!(selectors.status(&state), Status::Success);
        assert_eq!(*selectors.all(&state), vec![json!({ "id": 2 }), json!({ "id": 1 })]);
        assert_eq!(selectors.by_id(&state, &json!("1")), Some(json!({ "id": 1 })));
        assert_eq!(selectors.total(&state), 42);

        let view = selectors.list_view(&state);
        assert_eq!(view.total, 42);
        assert!(Arc::ptr_eq(&view.entities, &selectors.all(&state)));
    }

    #[test]
    fn test_list_view_serializes_for_rendering() {
        let model = users();
        let root = root(&model);
        let mut state = root.initial_state();
        root.reduce_state(
            &mut state,
            &model.actions().insert_entity(Envelope {
                payload: json!([{ "id": 5 }]),
                paging: None,
            }),
        );

        let view = model.selectors().list_view(&state);
        let rendered = serde_json::to_value(view.as_ref()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "status": "SUCCESS",
                "error": null,
                "entities": [{ "id": 5 }],
                "total": 1
            })
        );
    }

    #[test]
    fn test_unchanged_slice_hits_cache() {
        let model = users();
        let root = root(&model);
        let mut state = root.initial_state();
        let selectors = model.selectors();

        let first = selectors.list_view(&state);
        // Unhandled actions keep the slice pointer
        root.reduce_state(&mut state, &statekit_core::action::Action::new("orders/REQUEST"));
        let second = selectors.list_view(&state);
        assert!(Arc::ptr_eq(&first, &second));

        root.reduce_state(&mut state, &model.actions().request());
        let third = selectors.list_view(&state);
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.status, Status::Loading);
    }

    #[test]
    fn test_substate_lookup() {
        let model = EntityModel::new("profile", Shape::new().field("email", predicates::is_string));
        let account: Arc<dyn SliceReducer> =
            Arc::new(RootReducer::<()>::new([("profile".to_string(), model.object_slice())]));
        let root: RootReducer = RootReducer::new([("account".to_string(), account)]);

        let mut state = root.initial_state();
        root.reduce_state(
            &mut state,
            &model.actions().success(Envelope {
                payload: json!({ "email": "a@b.c" }),
                paging: None,
            }),
        );

        let nested = EntitySelectors::new("profile").within("account");
        assert_eq!(nested.status(&state), Status::Success);
        assert_eq!(nested.data(&state)["email"], "a@b.c");

        let flat = EntitySelectors::new("profile");
        assert_eq!(flat.status(&state), Status::NotRequested);
    }
}
