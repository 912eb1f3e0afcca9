//! The fetch task: one gateway call surrounded by entity actions
//!
//! ```text
//! REQUEST ──▶ gateway call ──┬─ ok ──▶ INSERT (list) / SUCCESS (object)
//!                            └─ err ─▶ FAILURE  (+ auth/UNAUTHORIZED on 401)
//! ```
//!
//! `REQUEST` is reduced before the call starts. The call is the only
//! suspension point between the two dispatches, so a task cancelled while
//! waiting for the server dispatches nothing further.

use crate::actions::ActionCreators;
use serde_json::Value;
use statekit_gateway::{ApiResponse, HttpGateway, RequestParams};
use statekit_runtime::{StoreError, Task, TaskContext, TaskRef};
use statekit_core::action::Action;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Dispatched by a fetch that received a 401
pub const UNAUTHORIZED: &str = "auth/UNAUTHORIZED";

/// Environments that can reach the backend
pub trait GatewayEnvironment: Send + Sync + 'static {
    /// The gateway fetch tasks call
    fn gateway(&self) -> &dyn HttpGateway;
}

impl GatewayEnvironment for Arc<dyn HttpGateway> {
    fn gateway(&self) -> &dyn HttpGateway {
        self.as_ref()
    }
}

/// Which reducer family receives a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    /// Records are appended with `INSERT`
    #[default]
    List,
    /// The record replaces the data with `SUCCESS`
    Object,
}

/// Fetch one resource and dispatch the outcome
///
/// Returns the gateway response so callers can react to it further.
///
/// # Errors
///
/// Returns [`StoreError::ShutdownInProgress`] when the store stops accepting
/// actions before the outcome could be dispatched.
#[tracing::instrument(skip(ctx, params), fields(target = %params.target()))]
pub async fn fetch<E>(
    ctx: &TaskContext<E>,
    params: RequestParams,
    entity: &str,
    kind: ResourceKind,
) -> Result<ApiResponse, StoreError>
where
    E: GatewayEnvironment,
{
    let actions = ActionCreators::new(entity);
    ctx.dispatch(actions.request()).await?;

    let response = ctx.environment().gateway().request(params).await;

    if response.ok {
        let outcome = match kind {
            ResourceKind::List => actions.insert_entity(response.envelope()),
            ResourceKind::Object => actions.success(response.envelope()),
        };
        ctx.dispatch(outcome).await?;
        tracing::debug!(status = response.status, "Fetch succeeded");
        return Ok(response);
    }

    ctx.dispatch(actions.failure(response.error_info())).await?;
    if response.is_unauthorized() {
        tracing::warn!("Fetch rejected as unauthorized");
        ctx.dispatch(Action::new(UNAUTHORIZED)).await?;
    } else {
        tracing::debug!(
            status = response.status,
            message_key = ?response.message_key,
            "Fetch failed"
        );
    }

    Ok(response)
}

/// A task running [`fetch`] with fixed parameters
///
/// When the task is injected with object args, each field is added as a query
/// parameter, overriding a parameter of the same name.
///
/// # Example
///
/// ```
/// use statekit_entities::{FetchTask, ResourceKind};
/// use statekit_gateway::RequestParams;
///
/// let task = FetchTask::new("users", ResourceKind::List, RequestParams::endpoint("/users"));
/// assert_eq!(task.entity(), "users");
/// ```
#[derive(Debug, Clone)]
pub struct FetchTask {
    name: String,
    entity: String,
    kind: ResourceKind,
    params: RequestParams,
}

impl FetchTask {
    /// Fetch `entity` with `params`
    #[must_use]
    pub fn new(entity: impl Into<String>, kind: ResourceKind, params: RequestParams) -> Self {
        let entity = entity.into();
        Self {
            name: format!("{entity}/fetch"),
            entity,
            kind,
            params,
        }
    }

    /// The entity this task fills
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Share the task so it can be injected
    #[must_use]
    pub fn into_ref<E>(self) -> TaskRef<E>
    where
        E: GatewayEnvironment,
    {
        Arc::new(self)
    }

    fn params_with(&self, args: &Value) -> RequestParams {
        let mut params = self.params.clone();
        if let Value::Object(fields) = args {
            for (key, value) in fields {
                params = params.with_param(key.clone(), value.clone());
            }
        }
        params
    }
}

impl<E> Task<E> for FetchTask
where
    E: GatewayEnvironment,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: TaskContext<E>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let params = self.params_with(ctx.args());
        let entity = self.entity.clone();
        let kind = self.kind;

        Box::pin(async move {
            if let Err(error) = fetch(&ctx, params, &entity, kind).await {
                tracing::debug!(%entity, %error, "Fetch abandoned");
            }
        })
    }
}
