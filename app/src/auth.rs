//! Authentication flow: the bearer token and the current user
//!
//! ```text
//! auth/LOGIN { token } ──▶ store token ──▶ fetch user (user/REQUEST … user/SUCCESS)
//! auth/LOGOUT ─────────┐
//! auth/UNAUTHORIZED ───┴─▶ remove token ──▶ auth/LOGGED_OUT ──▶ user slice reset
//! ```
//!
//! The flow runs as a daemon for the whole life of the store. It subscribes
//! when the task is started, so an action sent right after
//! `configure_store` returns is seen. Actions are handled one at a time in
//! dispatch order; a login's user fetch finishes before the next auth action
//! is looked at.

use crate::environment::AppEnvironment;
use serde::{Deserialize, Serialize};
use serde_json::json;
use statekit_core::action::Action;
use statekit_core::composition::{ReducerTable, SliceReducer};
use statekit_core::shape::{Shape, predicates};
use statekit_entities::{Diagnostics, EntityModel, ObjectState, ResourceKind, fetch};
use statekit_gateway::RequestParams;
use statekit_runtime::{StoreError, Task, TaskContext};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, error::RecvError};

pub use statekit_entities::UNAUTHORIZED;

/// Store a token and load the user; payload `{ "token": "…" }`
pub const LOGIN: &str = "auth/LOGIN";

/// Forget the token
pub const LOGOUT: &str = "auth/LOGOUT";

/// The token is gone and the user slice was reset
pub const LOGGED_OUT: &str = "auth/LOGGED_OUT";

/// Key of the current-user slice
pub const USER: &str = "user";

#[derive(Debug, Serialize, Deserialize)]
struct Login {
    token: String,
}

/// A [`LOGIN`] action carrying `token`
#[must_use]
pub fn login(token: impl Into<String>) -> Action {
    let payload = Login { token: token.into() };
    Action::with_payload(LOGIN, json!(payload))
}

/// A [`LOGOUT`] action
#[must_use]
pub fn logout() -> Action {
    Action::new(LOGOUT)
}

/// The current user: any record with an id
#[must_use]
pub fn user_model(diagnostics: Diagnostics) -> EntityModel {
    EntityModel::new(USER, Shape::new().field("id", predicates::is_id)).with_diagnostics(diagnostics)
}

/// Singleton reducers for [`user_model`], reset by [`LOGGED_OUT`]
#[must_use]
pub fn user_reducer(model: &EntityModel) -> Arc<dyn SliceReducer> {
    Arc::new(user_table(model))
}

fn user_table(model: &EntityModel) -> ReducerTable<ObjectState> {
    let reset = ReducerTable::<ObjectState>::new().on(LOGGED_OUT, |state, _| {
        *state = ObjectState::default();
    });
    model.object_reducers().merge(reset)
}

/// The auth daemon
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthFlow;

impl AuthFlow {
    async fn run_loop(
        ctx: TaskContext<AppEnvironment>,
        mut actions: Receiver<Action>,
    ) -> Result<(), StoreError> {
        loop {
            let action = match actions.recv().await {
                Ok(action) => action,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth flow fell behind; actions skipped");
                    continue;
                },
                Err(RecvError::Closed) => return Ok(()),
            };

            if action.is(LOGIN) {
                Self::login(&ctx, &action).await?;
            } else if action.is(LOGOUT) || action.is(UNAUTHORIZED) {
                Self::logout(&ctx, &action).await?;
            }
        }
    }

    async fn login(ctx: &TaskContext<AppEnvironment>, action: &Action) -> Result<(), StoreError> {
        let login = match action.payload_as::<Login>() {
            Ok(login) => login,
            Err(error) => {
                tracing::warn!(%error, "Login without a token ignored");
                return Ok(());
            },
        };

        let env = ctx.environment();
        env.credentials()
            .set(&env.config().token_key, login.token)
            .await;
        tracing::info!("Token stored");

        let profile = RequestParams::endpoint(env.config().profile_endpoint.clone());
        fetch(ctx, profile, USER, ResourceKind::Object).await?;
        Ok(())
    }

    async fn logout(ctx: &TaskContext<AppEnvironment>, action: &Action) -> Result<(), StoreError> {
        let env = ctx.environment();
        env.credentials().remove(&env.config().token_key).await;
        tracing::info!(cause = %action.action_type, "Token removed");

        ctx.dispatch(Action::new(LOGGED_OUT)).await?;
        Ok(())
    }
}

impl Task<AppEnvironment> for AuthFlow {
    fn name(&self) -> &str {
        "auth"
    }

    fn run(&self, ctx: TaskContext<AppEnvironment>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        // Before the future is first polled
        let actions = ctx.subscribe();
        Box::pin(async move {
            if let Err(error) = Self::run_loop(ctx, actions).await {
                tracing::debug!(%error, "Auth flow stopped");
            }
        })
    }
}
