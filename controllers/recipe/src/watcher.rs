//! Kubernetes resource watcher.
//!
//! Drives [`Reconciler::reconcile_recipe`] from `kube_runtime::Controller`.
//! Recipes are the primary resource; owned Deployments are watched too, so
//! drift on a child triggers reconciliation of its Recipe.
//!
//! The runtime guarantees at most one in-flight reconcile per Recipe and runs
//! distinct Recipes concurrently up to the configured limit.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crds::Recipe;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, info_span};

/// Shared state handed to every reconcile invocation
pub struct Context {
    pub reconciler: Reconciler,
    pub metrics: Arc<Metrics>,
    /// Deadline for a single cycle
    pub reconcile_timeout: Duration,
}

fn resource_key(recipe: &Recipe) -> (String, String) {
    (recipe.namespace().unwrap_or_default(), recipe.name_any())
}

/// Reconcile entry point for the runtime.
///
/// A cycle that outlives `reconcile_timeout` is dropped, including any store
/// call in flight, and reported as [`ControllerError::Cancelled`].
pub async fn reconcile(recipe: Arc<Recipe>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let (namespace, name) = resource_key(&recipe);
    let span = info_span!("reconcile", namespace = %namespace, name = %name);
    let start = Instant::now();

    let cycle = ctx.reconciler.reconcile_recipe(&namespace, &name);
    let result = match tokio::time::timeout(ctx.reconcile_timeout, cycle)
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(_) => Err(ControllerError::Cancelled(ctx.reconcile_timeout)),
    };

    match result {
        Ok(state) => {
            ctx.metrics.observe_success(state, start.elapsed());
            ctx.reconciler.reset_error(&format!("{namespace}/{name}"));
            debug!("Reconciled Recipe {}/{}: {}", namespace, name, state);
            Ok(state.requeue().into())
        }
        Err(e) => {
            ctx.metrics.observe_failure(&e, start.elapsed());
            Err(e)
        }
    }
}

/// Error policy: requeue with per-Recipe Fibonacci backoff.
pub fn error_policy(recipe: Arc<Recipe>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let (namespace, name) = resource_key(&recipe);
    let key = format!("{namespace}/{name}");
    ctx.reconciler.increment_error(&key);
    let (backoff_seconds, error_count) = ctx.reconciler.get_backoff_for_resource(&key);
    error!(
        "Reconciliation error for Recipe {} ({}, error #{}), retrying in {}s: {}",
        key,
        error.kind(),
        error_count,
        backoff_seconds,
        error
    );
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Watches Recipes and their Deployments until shutdown is signalled.
pub async fn watch_recipes(
    client: Client,
    config: ControllerConfig,
    ctx: Arc<Context>,
) -> Result<(), ControllerError> {
    let (recipes, deployments): (Api<Recipe>, Api<Deployment>) = match &config.watch_namespace {
        Some(ns) => (Api::namespaced(client.clone(), ns), Api::namespaced(client, ns)),
        None => (Api::all(client.clone()), Api::all(client)),
    };

    let runtime_config = RuntimeConfig::default()
        .debounce(config.debounce)
        .concurrency(config.concurrency);

    info!("Starting Recipe watcher");
    ctx.metrics.set_ready();

    Controller::new(recipes, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconcile finished for {}", obj),
                Err(e) => error!("Controller error for Recipe: {}", e),
            }
        })
        .await;

    info!("Recipe watcher stopped");
    Ok(())
}
