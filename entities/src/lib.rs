//! # Statekit Entities
//!
//! Everything a remote resource needs in the store, generated from a name and
//! a record shape:
//!
//! - **Reducers**: [`EntityModel::list_reducers`] and
//!   [`EntityModel::object_reducers`] handle `"<entity>/<VERB>"` actions
//! - **Action creators**: [`ActionCreators`]
//! - **Fetch task**: [`FetchTask`] and [`fetch`], driven by the injector
//! - **Selectors**: [`EntitySelectors`], memoized on the slice pointer
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use statekit_core::composition::RootReducer;
//! use statekit_core::shape::{Shape, predicates};
//! use statekit_core::status::{Envelope, Status};
//! use statekit_entities::EntityModel;
//!
//! let users = EntityModel::new(
//!     "users",
//!     Shape::new()
//!         .field("id", predicates::is_id)
//!         .field("name", predicates::is_string),
//! );
//!
//! let root: RootReducer = RootReducer::new([("users".to_string(), users.list_slice())]);
//! let mut state = root.initial_state();
//!
//! root.reduce_state(&mut state, &users.actions().request());
//! root.reduce_state(
//!     &mut state,
//!     &users.actions().insert_entity(Envelope {
//!         payload: json!([{ "id": 1, "name": "Ada" }]),
//!         paging: None,
//!     }),
//! );
//!
//! let selectors = users.selectors();
//! assert_eq!(selectors.status(&state), Status::Success);
//! assert_eq!(selectors.total(&state), 1);
//! ```

pub mod actions;
pub mod fetch;
pub mod reducers;
pub mod selectors;
pub mod state;

pub use actions::ActionCreators;
pub use fetch::{FetchTask, GatewayEnvironment, ResourceKind, UNAUTHORIZED, fetch};
pub use reducers::{Diagnostics, EntityModel, Mapper, RecordError};
pub use selectors::{EntitySelectors, ListView};
pub use state::{ListState, ObjectState, entity_key};
