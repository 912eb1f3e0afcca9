//! Statekit demo
//!
//! Wires the store from environment configuration, optionally logs in with
//! `DEMO_TOKEN`, mounts a `posts` list module and prints what it loaded.
//!
//! Run with: `API_ROOT=https://jsonplaceholder.typicode.com cargo run --bin statekit-demo`
//! Metrics: set `METRICS_ADDR=127.0.0.1:9000` and scrape `/metrics`

use anyhow::Context;
use serde_json::json;
use statekit_app::config::AppConfig;
use statekit_app::{AppEnvironment, auth, configure_store};
use statekit_core::shape::{Shape, predicates};
use statekit_entities::{EntityModel, FetchTask, ResourceKind};
use statekit_gateway::{InMemoryCredentialStore, RequestParams};
use statekit_runtime::metrics::{MetricsServer, register_metrics};
use statekit_runtime::{ModuleScope, TaskDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_tracing(&config);

    let _metrics = match config.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start().context("starting metrics exporter")?;
            info!(%addr, "Metrics exporter listening");
            Some(server)
        },
        None => {
            register_metrics();
            None
        },
    };

    let wait = Duration::from_secs(config.timeout_secs + 1);
    let environment = AppEnvironment::live(config, Arc::new(InMemoryCredentialStore::new()))
        .context("building request gateway")?;
    let app = configure_store(environment).context("configuring store")?;

    if let Ok(token) = std::env::var("DEMO_TOKEN") {
        app.store.send(auth::login(token)).await?;
    }

    let posts = EntityModel::new(
        "posts",
        Shape::new()
            .field("id", predicates::is_id)
            .field("title", predicates::is_string),
    )
    .with_diagnostics(app.store.environment().config().environment.diagnostics());

    let module = ModuleScope::new("posts")
        .with_reducer(posts.list_slice())
        .with_task(TaskDescriptor::new(
            FetchTask::new("posts", ResourceKind::List, RequestParams::endpoint("/posts")).into_ref(),
        ))
        .with_args(json!({ "_limit": 10 }));

    let mut actions = app.store.subscribe();
    let mount = module.mount(&app.injector).await?;

    let settled = tokio::select! {
        settled = tokio::time::timeout(wait, async {
            loop {
                match actions.recv().await {
                    Ok(action) if action.is("posts/INSERT") || action.is("posts/FAILURE") => return true,
                    Ok(_) | Err(RecvError::Lagged(_)) => {},
                    Err(RecvError::Closed) => return false,
                }
            }
        }) => settled.unwrap_or(false),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C");
            false
        }
    };

    if settled {
        let selectors = posts.selectors();
        let view = app.store.state(|state| selectors.list_view(state)).await;
        println!("{}", serde_json::to_string_pretty(view.as_ref())?);
    } else {
        warn!("posts did not load before the deadline");
    }

    mount.unmount();
    app.store
        .shutdown(SHUTDOWN_TIMEOUT)
        .await
        .context("shutting down store")?;
    info!("Demo finished");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.environment.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
