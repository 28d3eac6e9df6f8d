//! Recipe Controller
//!
//! Reconciles Recipe custom resources into:
//! - a Deployment sized to the Recipe, owned by it
//! - an optional one-shot MySQL restore Job
//!
//! and reports progress through the Recipe's `Available` condition.

mod backoff;
mod builder;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube's rustls transport needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Recipe Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics address: {}", config.metrics_bind_address);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {:?}", config.debounce);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
