//! Prometheus metrics for observability and monitoring.
//!
//! Components record through the `metrics` facade; nothing is collected until
//! a recorder is installed. [`MetricsServer`] installs the Prometheus recorder
//! and serves the scrape endpoint.
//!
//! Metric families:
//! - `store.*`: actions, reducer timing, broadcast fan-out, tasks, shutdown
//! - `injector.*`: reducer and task injection
//! - `gateway.*`: outbound requests
//! - `entities.*`: dropped records
//!
//! # Example
//!
//! ```rust,no_run
//! use statekit_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// The scrape address
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install the recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. by another test), this logs a
    /// warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                tokio::spawn(async move {
                    if exporter.await.is_err() {
                        tracing::error!("Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store
    describe_counter!("store.commands.total", "Actions sent to the store");
    describe_histogram!("store.reducer.duration_seconds", "Time spent in the root reducer");
    describe_histogram!("store.broadcast.receivers", "Subscribers reached per reduced action");
    describe_counter!("store.reducer.replaced", "Root reducer replacements");
    describe_counter!("store.tasks.started", "Background tasks spawned");
    describe_counter!("store.tasks.cancelled", "Background tasks stopped by cancellation");
    describe_counter!("store.shutdown.initiated", "Graceful shutdowns started");
    describe_counter!("store.shutdown.completed", "Graceful shutdowns completed in time");
    describe_counter!("store.shutdown.timeout", "Graceful shutdowns that timed out");
    describe_counter!("store.shutdown.rejected_actions", "Actions rejected during shutdown");

    // Injector
    describe_counter!("injector.reducers.injected", "Reducers injected");
    describe_counter!("injector.tasks.started", "Tasks started by injection");
    describe_counter!("injector.tasks.cancelled", "Tasks cancelled by injection or ejection");

    // Gateway
    describe_counter!("gateway.requests.total", "Gateway calls, by outcome");
    describe_histogram!("gateway.request.duration_seconds", "Gateway call latency");
    describe_counter!("gateway.unauthorized", "Responses with status 401");

    // Entities
    describe_counter!("entities.records.dropped", "Records rejected by shape validation");
}
