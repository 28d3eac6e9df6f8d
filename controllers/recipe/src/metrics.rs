//! Probes and Prometheus metrics.
//!
//! Serves `/healthz`, `/readyz` and `/metrics` on the configured bind
//! address. Readiness flips once the Recipe watcher has started.

use crate::error::ControllerError;
use crate::reconciler::ReconcileState;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconcile metrics and readiness shared by the watcher and the HTTP server
pub struct Metrics {
    registry: Registry,
    reconciles: IntCounterVec,
    errors: IntCounterVec,
    duration: Histogram,
    ready: AtomicBool,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciles = IntCounterVec::new(
            Opts::new("recipe_reconcile_total", "Reconcile cycles by outcome"),
            &["outcome"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("recipe_reconcile_errors_total", "Failed reconcile cycles by error kind"),
            &["error"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "recipe_reconcile_duration_seconds",
            "Duration of reconcile cycles",
        ))?;

        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            errors,
            duration,
            ready: AtomicBool::new(false),
        })
    }

    /// Records a cycle that ended in `state`.
    pub fn observe_success(&self, state: ReconcileState, elapsed: Duration) {
        self.reconciles.with_label_values(&[state.as_str()]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// Records a failed cycle.
    pub fn observe_failure(&self, error: &ControllerError, elapsed: Duration) {
        self.reconciles.with_label_values(&["error"]).inc();
        self.errors.with_label_values(&[error.kind()]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(metrics): State<Arc<Metrics>>) -> StatusCode {
    if metrics.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(buf) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serves probes and metrics until the process exits.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving probes and metrics on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}
