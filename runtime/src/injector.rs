//! Dynamic reducer and task injection
//!
//! The [`Injector`] owns the two registries of an application store:
//!
//! - **Reducers**: key → slice reducer. Injecting a reducer rebuilds the
//!   store's root reducer from the static reducers plus every injected one.
//! - **Tasks**: key → slot. A slot is either `Running` (with the handle of the
//!   live instance) or `Done` (ejected; remembered so a once-only task is not
//!   started again).
//!
//! Task lifecycle on injection:
//!
//! | Slot                              | Mode                            | Result                    |
//! |-----------------------------------|---------------------------------|---------------------------|
//! | none, or a different task         | any                             | start (old one cancelled) |
//! | same task                         | `Daemon`, `OnceTillUnmount`     | leave as is               |
//! | same task                         | `RestartOnRemount`              | cancel if running, start  |
//!
//! Ejection cancels the running instance unless it is a daemon and marks the
//! slot `Done`.

use crate::tasks::{AppStore, TaskDescriptor, TaskHandle, TaskMode, TaskRef, same_task, spawn_task};
use crate::StoreError;
use serde_json::Value;
use statekit_core::action::Action;
use statekit_core::composition::{RootReducer, SliceReducer, same_reducer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Action dispatched after the root reducer changed, so new slices get their
/// initial state
pub const REPLACE_ACTION: &str = "@@statekit/REPLACE";

/// Errors returned by the injector
#[derive(Debug, Error)]
pub enum InjectorError {
    /// Keys must be non-empty strings
    #[error("Injector key must be a non-empty string")]
    InvalidKey,

    /// The store rejected the follow-up action
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a task on injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// A new instance was started
    Started,
    /// The registered task was left as is
    Kept,
}

enum TaskSlot<E> {
    Running {
        task: TaskRef<E>,
        mode: TaskMode,
        handle: TaskHandle,
    },
    Done {
        task: TaskRef<E>,
    },
}

impl<E> TaskSlot<E> {
    const fn task(&self) -> &TaskRef<E> {
        match self {
            Self::Running { task, .. } | Self::Done { task, .. } => task,
        }
    }

    const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Keyed reducer and task registries bound to one [`AppStore`]
pub struct Injector<E> {
    store: AppStore<E>,
    static_reducers: BTreeMap<String, Arc<dyn SliceReducer>>,
    reducers: Mutex<BTreeMap<String, Arc<dyn SliceReducer>>>,
    tasks: Mutex<HashMap<String, TaskSlot<E>>>,
}

impl<E> Injector<E>
where
    E: Send + Sync + 'static,
{
    /// Registries for `store`, whose root reducer always includes `static_reducers`
    #[must_use]
    pub fn new(
        store: AppStore<E>,
        static_reducers: impl IntoIterator<Item = (String, Arc<dyn SliceReducer>)>,
    ) -> Self {
        Self {
            store,
            static_reducers: static_reducers.into_iter().collect(),
            reducers: Mutex::new(BTreeMap::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// The store these registries feed
    #[must_use]
    pub const fn store(&self) -> &AppStore<E> {
        &self.store
    }

    /// The root reducer for the static reducers plus `injected`
    ///
    /// Injected reducers win over static ones registered under the same key.
    fn root_reducer(&self, injected: &BTreeMap<String, Arc<dyn SliceReducer>>) -> RootReducer<E> {
        let combined = self
            .static_reducers
            .iter()
            .chain(injected.iter())
            .map(|(key, reducer)| (key.clone(), Arc::clone(reducer)));
        RootReducer::new(combined)
    }

    /// Register `reducer` under `key` and rebuild the store's root reducer
    ///
    /// Re-injecting the identical reducer is a no-op and returns `false`.
    ///
    /// # Errors
    ///
    /// - [`InjectorError::InvalidKey`] if `key` is empty
    /// - [`InjectorError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self, reducer), name = "inject_reducer")]
    pub async fn inject_reducer(
        &self,
        key: &str,
        reducer: Arc<dyn SliceReducer>,
    ) -> Result<bool, InjectorError> {
        check_key(key)?;

        {
            let mut reducers = self.reducers.lock().unwrap_or_else(PoisonError::into_inner);
            if reducers
                .get(key)
                .is_some_and(|existing| same_reducer(existing, &reducer))
            {
                tracing::trace!("Reducer already injected");
                return Ok(false);
            }

            reducers.insert(key.to_string(), reducer);
            // Swapped under the registry lock so concurrent injections cannot
            // install an outdated root
            self.store.replace_reducer(self.root_reducer(&reducers));
        }

        metrics::counter!("injector.reducers.injected").increment(1);
        tracing::debug!("Reducer injected");

        self.store.send(Action::new(REPLACE_ACTION)).await?;
        Ok(true)
    }

    /// Check whether a reducer is injected under `key`
    #[must_use]
    pub fn has_reducer(&self, key: &str) -> bool {
        self.reducers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Start `descriptor.task` under `key` according to its mode
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`InjectorError::InvalidKey`] if `key` is empty
    /// - [`InjectorError::Store`] if the store is shutting down
    #[tracing::instrument(skip(self, descriptor, args), fields(mode = %descriptor.mode), name = "inject_task")]
    pub fn inject_task(
        &self,
        key: &str,
        descriptor: TaskDescriptor<E>,
        args: Value,
    ) -> Result<Injection, InjectorError> {
        check_key(key)?;
        if self.store.is_shutting_down() {
            return Err(StoreError::ShutdownInProgress.into());
        }

        let TaskDescriptor { task, mode } = descriptor;
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = tasks.get(key) {
            let same = same_task(slot.task(), &task);

            if same && matches!(mode, TaskMode::Daemon | TaskMode::OnceTillUnmount) {
                tracing::trace!(running = slot.is_running(), "Task kept");
                return Ok(Injection::Kept);
            }

            if let TaskSlot::Running { handle, .. } = slot {
                if same {
                    tracing::debug!("Restarting task on remount");
                } else {
                    tracing::debug!("Replacing task with a different implementation");
                }
                handle.cancel();
                metrics::counter!("injector.tasks.cancelled").increment(1);
            }
        }

        let handle = spawn_task(&self.store, &task, args);
        tasks.insert(key.to_string(), TaskSlot::Running { task, mode, handle });

        metrics::counter!("injector.tasks.started").increment(1);
        tracing::debug!("Task started");
        Ok(Injection::Started)
    }

    /// Stop the task under `key` unless it is a daemon
    ///
    /// Returns whether a running instance was cancelled. Unknown keys and
    /// already ejected tasks are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InjectorError::InvalidKey`] if `key` is empty.
    #[tracing::instrument(skip(self), name = "eject_task")]
    pub fn eject_task(&self, key: &str) -> Result<bool, InjectorError> {
        check_key(key)?;

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = tasks.remove(key) else {
            return Ok(false);
        };

        match slot {
            TaskSlot::Running {
                mode: TaskMode::Daemon,
                ..
            } => {
                tracing::trace!("Daemon task left running");
                tasks.insert(key.to_string(), slot);
                Ok(false)
            },
            TaskSlot::Running { task, mode, handle } => {
                handle.cancel();
                metrics::counter!("injector.tasks.cancelled").increment(1);
                tracing::debug!(mode = %mode, "Task ejected");
                tasks.insert(key.to_string(), TaskSlot::Done { task });
                Ok(true)
            },
            done @ TaskSlot::Done { .. } => {
                tasks.insert(key.to_string(), done);
                Ok(false)
            },
        }
    }

    /// Check whether a live instance is registered under `key`
    #[must_use]
    pub fn is_task_running(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(TaskSlot::is_running)
    }

    /// Check whether the task under `key` was ejected
    #[must_use]
    pub fn is_task_done(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|slot| !slot.is_running())
    }
}

impl<E> fmt::Debug for Injector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reducers: Vec<String> = self
            .reducers
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        let tasks: Vec<String> = self
            .tasks
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("Injector")
            .field("static_reducers", &self.static_reducers.keys().collect::<Vec<_>>())
            .field("reducers", &reducers)
            .field("tasks", &tasks)
            .finish_non_exhaustive()
    }
}

fn check_key(key: &str) -> Result<(), InjectorError> {
    if key.is_empty() {
        Err(InjectorError::InvalidKey)
    } else {
        Ok(())
    }
}

/// What a mounted module contributes: a reducer, a task, or both
pub struct ModuleScope<E> {
    key: String,
    reducer: Option<Arc<dyn SliceReducer>>,
    task: Option<TaskDescriptor<E>>,
    args: Value,
}

impl<E> ModuleScope<E>
where
    E: Send + Sync + 'static,
{
    /// An empty module under `key`
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reducer: None,
            task: None,
            args: Value::Null,
        }
    }

    /// Builder: Contribute a reducer
    #[must_use]
    pub fn with_reducer(mut self, reducer: Arc<dyn SliceReducer>) -> Self {
        self.reducer = Some(reducer);
        self
    }

    /// Builder: Contribute a task
    #[must_use]
    pub fn with_task(mut self, task: TaskDescriptor<E>) -> Self {
        self.task = Some(task);
        self
    }

    /// Builder: Arguments handed to the task
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Inject the reducer, then the task, and bind the task's lifetime to the
    /// returned guard
    ///
    /// # Errors
    ///
    /// Returns any [`InjectorError`] from the injections.
    pub async fn mount(&self, injector: &Arc<Injector<E>>) -> Result<Mount<E>, InjectorError> {
        if let Some(reducer) = &self.reducer {
            injector.inject_reducer(&self.key, Arc::clone(reducer)).await?;
        }

        let has_task = match &self.task {
            Some(task) => {
                injector.inject_task(&self.key, task.clone(), self.args.clone())?;
                true
            },
            None => {
                check_key(&self.key)?;
                false
            },
        };

        tracing::debug!(key = %self.key, "Module mounted");
        Ok(Mount {
            injector: Arc::clone(injector),
            key: self.key.clone(),
            has_task,
            active: true,
        })
    }
}

impl<E> fmt::Debug for ModuleScope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleScope")
            .field("key", &self.key)
            .field("has_reducer", &self.reducer.is_some())
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

/// A mounted module; ejects its task when unmounted or dropped
///
/// Injected reducers stay registered after unmount.
#[must_use = "dropping a Mount unmounts the module immediately"]
pub struct Mount<E>
where
    E: Send + Sync + 'static,
{
    injector: Arc<Injector<E>>,
    key: String,
    has_task: bool,
    active: bool,
}

impl<E> Mount<E>
where
    E: Send + Sync + 'static,
{
    /// The module key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Unmount now
    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if self.has_task {
            // The key was validated on mount
            let _ = self.injector.eject_task(&self.key);
        }
        tracing::debug!(key = %self.key, "Module unmounted");
    }
}

impl<E> Drop for Mount<E>
where
    E: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<E> fmt::Debug for Mount<E>
where
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("key", &self.key)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::tasks::{TaskContext, TaskFn};
    use statekit_core::composition::ReducerTable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Count(u32);

    fn counter(action: &'static str) -> Arc<dyn SliceReducer> {
        Arc::new(ReducerTable::<Count>::new().on(action, |state, _| state.0 += 1))
    }

    fn injector() -> Arc<Injector<()>> {
        let statics = [("app".to_string(), counter("app/HIT"))];
        let root = RootReducer::new(statics.clone());
        let store = Store::new(root.initial_state(), root, ());
        Arc::new(Injector::new(store, statics))
    }

    // A task that counts its starts and then parks until cancelled
    fn parked(starts: &Arc<AtomicUsize>) -> TaskRef<()> {
        let starts = Arc::clone(starts);
        TaskFn::arc("parked", move |ctx: TaskContext<()>| {
            starts.fetch_add(1, Ordering::SeqCst);
            async move { ctx.token().cancelled().await }
        })
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));

        assert!(matches!(
            injector.inject_reducer("", counter("x/HIT")).await,
            Err(InjectorError::InvalidKey)
        ));
        assert!(matches!(
            injector.inject_task("", TaskDescriptor::new(parked(&starts)), Value::Null),
            Err(InjectorError::InvalidKey)
        ));
        assert!(matches!(injector.eject_task(""), Err(InjectorError::InvalidKey)));
    }

    #[tokio::test]
    async fn test_inject_reducer_adds_slice_and_keeps_static() {
        let injector = injector();
        let users = counter("users/HIT");

        assert!(injector.inject_reducer("users", Arc::clone(&users)).await.unwrap());
        assert!(!injector.inject_reducer("users", users).await.unwrap());
        assert!(injector.has_reducer("users"));

        let store = injector.store();
        assert!(store.state(|s| s.contains("users")).await);

        store.send(Action::new("users/HIT")).await.unwrap();
        store.send(Action::new("app/HIT")).await.unwrap();
        let (users, app) = store
            .state(|s| {
                (
                    s.slice::<Count>("users").map(|c| c.0),
                    s.slice::<Count>("app").map(|c| c.0),
                )
            })
            .await;
        assert_eq!(users, Some(1));
        assert_eq!(app, Some(1));
    }

    #[tokio::test]
    async fn test_reinjecting_different_reducer_replaces_it() {
        let injector = injector();
        injector.inject_reducer("users", counter("users/HIT")).await.unwrap();
        assert!(injector.inject_reducer("users", counter("users/OTHER")).await.unwrap());

        let reducer = injector.store().reducer();
        assert!(reducer.get("users").is_some());
        assert!(reducer.get("app").is_some());
    }

    #[tokio::test]
    async fn test_restart_on_remount() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let descriptor = TaskDescriptor::new(parked(&starts));

        let first = injector.inject_task("k", descriptor.clone(), Value::Null).unwrap();
        let second = injector.inject_task("k", descriptor.clone(), Value::Null).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(first, Injection::Started);
        assert_eq!(second, Injection::Started);
        assert_eq!(starts.load(Ordering::SeqCst), 2);

        assert!(injector.eject_task("k").unwrap());
        assert!(injector.is_task_done("k"));
        injector.inject_task("k", descriptor, Value::Null).unwrap();
        assert!(injector.is_task_running("k"));
        assert_eq!(starts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_daemon_survives_eject_and_remount() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let descriptor = TaskDescriptor::new(parked(&starts)).with_mode(TaskMode::Daemon);

        injector.inject_task("d", descriptor.clone(), Value::Null).unwrap();
        assert!(!injector.eject_task("d").unwrap());
        assert!(injector.is_task_running("d"));

        let again = injector.inject_task("d", descriptor, Value::Null).unwrap();
        assert_eq!(again, Injection::Kept);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_once_till_unmount_never_restarts() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let descriptor = TaskDescriptor::new(parked(&starts)).with_mode(TaskMode::OnceTillUnmount);

        injector.inject_task("o", descriptor.clone(), Value::Null).unwrap();
        assert_eq!(
            injector.inject_task("o", descriptor.clone(), Value::Null).unwrap(),
            Injection::Kept
        );

        assert!(injector.eject_task("o").unwrap());
        assert_eq!(
            injector.inject_task("o", descriptor, Value::Null).unwrap(),
            Injection::Kept
        );
        assert!(injector.is_task_done("o"));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ejected_slot_follows_the_new_mode() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let task = parked(&starts);

        let once = TaskDescriptor::new(Arc::clone(&task)).with_mode(TaskMode::OnceTillUnmount);
        injector.inject_task("m", once, Value::Null).unwrap();
        assert!(injector.eject_task("m").unwrap());
        assert!(!injector.eject_task("m").unwrap());
        assert!(injector.is_task_done("m"));

        // The mode of the ejected instance is not consulted
        let restart = TaskDescriptor::new(task).with_mode(TaskMode::RestartOnRemount);
        let result = injector.inject_task("m", restart, Value::Null).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(result, Injection::Started);
        assert!(injector.is_task_running("m"));
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hot_reload_replaces_different_task() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let old = TaskDescriptor::new(parked(&starts)).with_mode(TaskMode::Daemon);
        let new = TaskDescriptor::new(parked(&starts)).with_mode(TaskMode::Daemon);

        injector.inject_task("h", old, Value::Null).unwrap();
        let result = injector.inject_task("h", new, Value::Null).unwrap();

        assert_eq!(result, Injection::Started);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mount_guard_ejects_on_drop() {
        let injector = injector();
        let starts = Arc::new(AtomicUsize::new(0));
        let scope = ModuleScope::new("page")
            .with_reducer(counter("page/HIT"))
            .with_task(TaskDescriptor::new(parked(&starts)));

        {
            let mount = scope.mount(&injector).await.unwrap();
            assert_eq!(mount.key(), "page");
            assert!(injector.is_task_running("page"));
            assert!(injector.has_reducer("page"));
        }
        assert!(injector.is_task_done("page"));
        // Reducer stays registered
        assert!(injector.has_reducer("page"));

        let mount = scope.mount(&injector).await.unwrap();
        assert!(injector.is_task_running("page"));
        mount.unmount();
        assert!(injector.is_task_done("page"));
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ejected_task_stops_dispatching() {
        let injector = injector();
        let ticker: TaskRef<()> = TaskFn::arc("ticker", |ctx: TaskContext<()>| async move {
            loop {
                let _ = ctx.dispatch(Action::new("app/HIT")).await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        injector.inject_task("t", TaskDescriptor::new(ticker), Value::Null).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        injector.eject_task("t").unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let read = |s: &statekit_core::state::AppState| s.slice::<Count>("app").map_or(0, |c| c.0);
        let after_eject = injector.store().state(read).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(after_eject > 0);
        assert_eq!(injector.store().state(read).await, after_eject);
    }

    #[tokio::test]
    async fn test_inject_after_shutdown_fails() {
        let injector = injector();
        injector.store().shutdown(Duration::from_secs(1)).await.unwrap();

        let starts = Arc::new(AtomicUsize::new(0));
        let result = injector.inject_task("late", TaskDescriptor::new(parked(&starts)), Value::Null);
        assert!(matches!(result, Err(InjectorError::Store(StoreError::ShutdownInProgress))));
    }
}
