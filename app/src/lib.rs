//! # Statekit App
//!
//! Application wiring for statekit: configuration from the environment, the
//! store with its static `user` slice, and the authentication daemon.
//!
//! ## Example
//!
//! ```no_run
//! use statekit_app::{AppEnvironment, configure_store};
//! use statekit_app::config::AppConfig;
//! use statekit_gateway::InMemoryCredentialStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let environment = AppEnvironment::live(config, Arc::new(InMemoryCredentialStore::new()))?;
//! let app = configure_store(environment)?;
//!
//! app.store.send(statekit_app::auth::login("secret")).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod environment;

pub use environment::AppEnvironment;

use statekit_core::composition::{RootReducer, SliceReducer};
use statekit_core::state::AppState;
use statekit_runtime::{
    AppStore, Injector, InjectorError, Store, StoreConfig, TaskDescriptor, TaskMode,
};
use std::sync::Arc;
use thiserror::Error;

/// Registry key of the authentication daemon
pub const AUTH_TASK: &str = "auth";

/// Errors raised while wiring the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// The HTTP gateway could not be built
    #[error(transparent)]
    Gateway(#[from] statekit_gateway::GatewayError),

    /// A reducer or task could not be registered
    #[error(transparent)]
    Injector(#[from] InjectorError),
}

/// The configured store and the injector feeding it
#[derive(Debug, Clone)]
pub struct AppContext {
    /// The one application store
    pub store: AppStore<AppEnvironment>,
    /// Registries for view-scoped reducers and tasks
    pub injector: Arc<Injector<AppEnvironment>>,
}

/// Build the application store and start the authentication daemon
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`AppError::Injector`] if the daemon cannot be started.
pub fn configure_store(environment: AppEnvironment) -> Result<AppContext, AppError> {
    configure_store_with(environment, AppState::new(), StoreConfig::default())
}

/// [`configure_store`] from a preloaded state
///
/// Slices missing from `initial_state` start from their reducer's initial
/// value; slices present are kept as given.
///
/// # Errors
///
/// Returns [`AppError::Injector`] if the daemon cannot be started.
pub fn configure_store_with(
    environment: AppEnvironment,
    mut initial_state: AppState,
    store_config: StoreConfig,
) -> Result<AppContext, AppError> {
    let user = auth::user_model(environment.config().environment.diagnostics());
    let statics: Vec<(String, Arc<dyn SliceReducer>)> =
        vec![(auth::USER.to_string(), auth::user_reducer(&user))];

    let root = RootReducer::new(statics.clone());
    root.hydrate(&mut initial_state);

    let store = Store::with_config(initial_state, root, environment, store_config);
    let injector = Arc::new(Injector::new(store.clone(), statics));

    injector.inject_task(
        AUTH_TASK,
        TaskDescriptor::new(Arc::new(auth::AuthFlow)).with_mode(TaskMode::Daemon),
        serde_json::Value::Null,
    )?;
    tracing::info!(
        environment = %store.environment().config().environment,
        "Store configured"
    );

    Ok(AppContext { store, injector })
}
