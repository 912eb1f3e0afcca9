//! # Statekit Runtime
//!
//! Runtime implementation for statekit.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and long-lived background tasks, plus the injector that grows the store's
//! reducer and task set while the application runs.
//!
//! ## Core Components
//!
//! - **Store**: holds state, runs the reducer, broadcasts every reduced
//!   action and owns the root cancellation token
//! - **Tasks**: cancellable background work driven by dispatched actions
//! - **Injector**: keyed reducer and task registries with mount scopes
//!
//! ## Example
//!
//! ```ignore
//! use statekit_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(action).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field.clone()).await;
//! ```

use statekit_core::reducer::Reducer;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Background tasks run by the store
pub mod tasks;

/// Dynamic reducer and task injection
pub mod injector;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A task join error occurred
        ///
        /// This typically means a spawned task panicked.
        #[error("Task failed: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for tasks to complete
        #[error("Shutdown timed out with {0} tasks still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use injector::{Injector, InjectorError, ModuleScope, Mount, REPLACE_ACTION};
pub use tasks::{
    AppStore, Task, TaskContext, TaskDescriptor, TaskFn, TaskHandle, TaskMode, TaskRef,
    UnknownTaskMode, same_task, spawn_task,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use statekit_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(256)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.broadcast_capacity, 256);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of actions buffered for slow subscribers
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(broadcast_capacity: usize, default_shutdown_timeout: Duration) -> Self {
        Self {
            broadcast_capacity,
            default_shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Guard that decrements the running-task counter on drop
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and tasks.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, Duration, Ordering, Reducer, RwLock,
        StoreConfig, StoreError,
    };
    use crate::tasks::TaskHandle;
    use std::future::Future;
    use std::sync::PoisonError;
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (replaceable at runtime)
    /// 3. Environment (injected dependencies)
    /// 4. The action broadcast every subscriber and task listens on
    /// 5. Background tasks (children of one root cancellation token)
    ///
    /// Clones share everything: state, reducer slot, environment, broadcast
    /// channel and cancellation tree.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<std::sync::RwLock<Arc<R>>>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_tasks: Arc<AtomicUsize>,
        cancellation: CancellationToken,
        config: StoreConfig,
        /// Every reduced action, published after the state change.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default`].
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(std::sync::RwLock::new(Arc::new(reducer))),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_tasks: Arc::new(AtomicUsize::new(0)),
                cancellation: CancellationToken::new(),
                config,
                action_broadcast,
            }
        }

        /// The injected dependencies
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// The reducer currently in use
        #[must_use]
        pub fn reducer(&self) -> Arc<R> {
            Arc::clone(&self.reducer.read().unwrap_or_else(PoisonError::into_inner))
        }

        /// Swap in a new reducer
        ///
        /// Takes effect for the next reduced action. State is left untouched;
        /// callers that need new slices initialized dispatch an action
        /// afterwards.
        pub fn replace_reducer(&self, reducer: R) {
            *self.reducer.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(reducer);
            metrics::counter!("store.reducer.replaced").increment(1);
            tracing::debug!("Reducer replaced");
        }

        /// Check whether shutdown has started
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Number of tasks still running
        #[must_use]
        pub fn pending(&self) -> usize {
            self.pending_tasks.load(Ordering::Acquire)
        }

        /// Initiate graceful shutdown of the store
        ///
        /// This method:
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Cancels every task started with [`Store::run_task`]
        /// 3. Waits for those tasks to finish (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// tasks complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);
            self.cancellation.cancel();

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_tasks.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All tasks completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_tasks = pending, "Shutdown timed out");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls the current reducer with (state, action, environment)
        /// 3. Broadcasts the action to subscribers, still under the lock
        ///
        /// Concurrent `send()` calls serialize at the reducer, and subscribers
        /// receive actions in the order they were reduced.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let mut state = self.state.write().await;
            let reducer = self.reducer();

            {
                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                reducer.reduce(&mut *state, action.clone(), &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());
            }

            // No receivers is not an error
            let receivers = self.action_broadcast.send(action).unwrap_or(0);
            drop(state);

            tracing::trace!(receivers, "Action broadcast");
            // Note: Precision loss acceptable for metrics (receiver counts < 2^52)
            #[allow(clippy::cast_precision_loss)]
            metrics::histogram!("store.broadcast.receivers").record(receivers as f64);

            Ok(())
        }

        /// Alias of [`Store::send`]
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn dispatch(&self, action: A) -> Result<(), StoreError> {
            self.send(action).await
        }

        /// Send an action and wait for a matching action
        ///
        /// Subscribes before sending, so a match produced by a task reacting
        /// to the action cannot be missed.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to every action this store reduces
        ///
        /// Each action is published after the reducer ran, so a subscriber
        /// reading state on receipt sees the change. Slow subscribers may lag
        /// and skip actions once the configured capacity is exceeded.
        #[must_use]
        pub fn subscribe(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Spawn a background task
        ///
        /// `make` receives the task's cancellation token (a child of the store's
        /// root token). The spawned future is raced against that token, so once
        /// cancelled it is dropped at its next suspension point.
        pub fn run_task<F, Fut>(&self, name: &str, make: F) -> TaskHandle
        where
            F: FnOnce(CancellationToken) -> Fut,
            Fut: Future<Output = ()> + Send + 'static,
        {
            let token = self.cancellation.child_token();
            let future = make(token.clone());

            self.pending_tasks.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_tasks));
            metrics::counter!("store.tasks.started").increment(1);

            let task_token = token.clone();
            let task_name = name.to_string();
            let join = tokio::spawn(async move {
                let _pending_guard = pending_guard;
                tokio::select! {
                    () = task_token.cancelled() => {
                        tracing::debug!(task = %task_name, "Task cancelled");
                        metrics::counter!("store.tasks.cancelled").increment(1);
                    },
                    () = future => {
                        tracing::debug!(task = %task_name, "Task finished");
                    },
                }
            });

            TaskHandle::new(name, token, join)
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_tasks: Arc::clone(&self.pending_tasks),
                cancellation: self.cancellation.clone(),
                config: self.config.clone(),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> std::fmt::Debug for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("pending_tasks", &self.pending_tasks.load(Ordering::SeqCst))
                .field("shutting_down", &self.shutdown.load(Ordering::SeqCst))
                .finish_non_exhaustive()
        }
    }
}

// Re-export for convenience
pub use store::Store;
