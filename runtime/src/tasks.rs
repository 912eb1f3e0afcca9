//! Long-lived background tasks
//!
//! A [`Task`] is asynchronous work driven by the store: it dispatches actions,
//! waits on subscriptions and calls out to the environment. Tasks are started
//! through the [`Injector`](crate::Injector) (or directly with
//! [`Store::run_task`](crate::Store::run_task)) and receive a [`TaskContext`].
//!
//! Cancellation is cooperative: the running future is raced against the
//! task's token and dropped at its next suspension point once the token
//! fires.

use crate::{Store, StoreError};
use serde_json::Value;
use statekit_core::action::Action;
use statekit_core::composition::RootReducer;
use statekit_core::state::AppState;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The application store: keyed slices, string-typed actions
pub type AppStore<E> = Store<AppState, Action, E, RootReducer<E>>;

/// Shared handle to a task; identity is the `Arc` allocation
pub type TaskRef<E> = Arc<dyn Task<E>>;

/// Asynchronous, cancellable unit of work run against an [`AppStore`]
pub trait Task<E>: Send + Sync {
    /// Stable, human-readable name used in logs
    fn name(&self) -> &str;

    /// Run until completion or cancellation
    fn run(&self, ctx: TaskContext<E>) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// A task backed by a closure
///
/// # Example
///
/// ```
/// use statekit_runtime::tasks::{TaskContext, TaskFn, TaskRef};
///
/// let task: TaskRef<()> = TaskFn::arc("noop", |_ctx: TaskContext<()>| async {});
/// assert_eq!(task.name(), "noop");
/// ```
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    func: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task
    pub fn new(name: impl Into<Cow<'static, str>>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Creates the task and returns it as a shared handle
    pub fn arc(name: impl Into<Cow<'static, str>>, func: F) -> Arc<Self> {
        Arc::new(Self::new(name, func))
    }
}

impl<E, F, Fut> Task<E> for TaskFn<F>
where
    F: Fn(TaskContext<E>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: TaskContext<E>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin((self.func)(ctx))
    }
}

impl<F> fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Lifecycle policy of an injected task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskMode {
    /// Restarted every time its module mounts; cancelled on unmount
    #[default]
    RestartOnRemount,
    /// Started once and never cancelled by unmounting
    Daemon,
    /// Started once; cancelled on unmount and never started again
    OnceTillUnmount,
}

impl TaskMode {
    /// Wire name of this mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RestartOnRemount => "@@statekit/restart-on-remount",
            Self::Daemon => "@@statekit/daemon",
            Self::OnceTillUnmount => "@@statekit/once-till-unmount",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mode name that is not one of the three [`TaskMode`]s
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task mode '{0}'")]
pub struct UnknownTaskMode(pub String);

impl FromStr for TaskMode {
    type Err = UnknownTaskMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::RestartOnRemount, Self::Daemon, Self::OnceTillUnmount]
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownTaskMode(s.to_string()))
    }
}

/// A task together with its lifecycle policy
pub struct TaskDescriptor<E> {
    /// The work to run
    pub task: TaskRef<E>,
    /// When it starts and stops
    pub mode: TaskMode,
}

impl<E> TaskDescriptor<E> {
    /// A descriptor with the default mode ([`TaskMode::RestartOnRemount`])
    #[must_use]
    pub fn new(task: TaskRef<E>) -> Self {
        Self {
            task,
            mode: TaskMode::default(),
        }
    }

    /// Builder: Set the mode
    #[must_use]
    pub const fn with_mode(mut self, mode: TaskMode) -> Self {
        self.mode = mode;
        self
    }
}

impl<E> Clone for TaskDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
            mode: self.mode,
        }
    }
}

impl<E> fmt::Debug for TaskDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("task", &self.task.name())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Check whether two task handles refer to the same task
#[must_use]
pub fn same_task<E>(a: &TaskRef<E>, b: &TaskRef<E>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Everything a running task can reach
pub struct TaskContext<E> {
    store: AppStore<E>,
    token: CancellationToken,
    args: Value,
}

impl<E> TaskContext<E>
where
    E: Send + Sync + 'static,
{
    /// Context for one run of a task
    #[must_use]
    pub const fn new(store: AppStore<E>, token: CancellationToken, args: Value) -> Self {
        Self { store, token, args }
    }

    /// Dispatch an action to the store
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    pub async fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.store.send(action).await
    }

    /// Read the current state
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&AppState) -> T,
    {
        self.store.state(f).await
    }

    /// Subscribe to every action reduced from now on
    ///
    /// A task that must not miss actions sent right after it was started
    /// calls this in [`Task::run`], before building its future.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.store.subscribe()
    }

    /// The store's environment
    #[must_use]
    pub fn environment(&self) -> &E {
        self.store.environment()
    }

    /// The store itself
    #[must_use]
    pub const fn store(&self) -> &AppStore<E> {
        &self.store
    }

    /// Arguments given at injection time
    #[must_use]
    pub const fn args(&self) -> &Value {
        &self.args
    }

    /// This run's cancellation token
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Check whether this run was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<E> Clone for TaskContext<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            token: self.token.clone(),
            args: self.args.clone(),
        }
    }
}

impl<E> fmt::Debug for TaskContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.token.is_cancelled())
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Handle to one running task: its token and join handle
pub struct TaskHandle {
    name: String,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn new(name: &str, token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self {
            name: name.to_string(),
            token,
            join,
        }
    }

    /// Name the task was started with
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Check whether the task has stopped
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to stop
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskJoinError`] if the task panicked.
    pub async fn join(self) -> Result<(), StoreError> {
        self.join.await.map_err(StoreError::from)
    }

    /// Cancel, then wait up to `timeout` for the task to stop
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the task did not stop in time, or
    /// [`StoreError::TaskJoinError`] if it panicked.
    pub async fn stop(self, timeout: Duration) -> Result<(), StoreError> {
        self.cancel();
        tokio::time::timeout(timeout, self.join())
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

/// Start `task` on `store`
///
/// The task's future is built immediately; the returned handle owns its
/// cancellation token.
pub fn spawn_task<E>(store: &AppStore<E>, task: &TaskRef<E>, args: Value) -> TaskHandle
where
    E: Send + Sync + 'static,
{
    let context_store = store.clone();
    let runner = Arc::clone(task);
    store.run_task(task.name(), move |token| {
        runner.run(TaskContext::new(context_store, token, args))
    })
}
