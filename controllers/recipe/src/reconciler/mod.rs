//! Reconciliation logic for Recipes.
//!
//! One cycle reads the Recipe fresh, walks it through the states in
//! [`ReconcileState`] and ends with at most one status write per branch:
//!
//! 1. Recipe gone: stop.
//! 2. No conditions yet: record `Available=Unknown` and re-fetch.
//! 3. Deletion marker set: stop, the store cascades the children.
//! 4. Deployment missing: build and create it, requeue after a minute.
//! 5. Replica count drifted: write the corrected count, requeue immediately.
//! 6. Otherwise: record `Available=True`.
//!
//! The restore Job is ensured alongside, after the deletion check. Its
//! failures are logged and never change the cycle's outcome.

pub mod state;
pub mod status;

use crate::backoff::FibonacciBackoff;
use crate::builder::{DesiredStateBuilder, RESTORE_JOB_NAME};
use crate::error::ControllerError;
use chrono::Utc;
use cluster_client::ClusterClientTrait;
use crds::{Condition, ConditionStatus, ConditionType, Recipe};
use k8s_openapi::api::apps::v1::Deployment;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub use state::{ReconcileState, Requeue, classify_workload};
pub use status::update_status_with_retry;

/// Condition reason while the controller works towards the declared state
pub const REASON_RECONCILING: &str = "Reconciling";
/// Condition reason when a replica correction failed
pub const REASON_RESIZING: &str = "Resizing";

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(5, 300), // 5 seconds min, 5 minutes max
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Reconciles Recipes against the cluster store.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClientTrait>,
    pub(crate) builder: DesiredStateBuilder,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ClusterClientTrait>, builder: DesiredStateBuilder) -> Self {
        Self {
            client,
            builder,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs one reconcile cycle for the Recipe `namespace/name`.
    pub async fn reconcile_recipe(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileState, ControllerError> {
        let Some(mut recipe) = self.client.get_recipe(namespace, name).await? else {
            info!("Recipe {}/{} not found, ignoring since it must have been deleted", namespace, name);
            return Ok(ReconcileState::NotFound);
        };

        if recipe.has_no_conditions() {
            debug!("Recipe {}/{} is {}", namespace, name, ReconcileState::StatusUninitialized);
            let generation = recipe.metadata.generation;
            update_status_with_retry(self.client.as_ref(), recipe, |status| {
                status.set_condition(
                    Condition::new(
                        ConditionType::Available,
                        ConditionStatus::Unknown,
                        REASON_RECONCILING,
                        "Starting reconciliation",
                        Utc::now(),
                    )
                    .with_observed_generation(generation),
                )
            })
            .await?;

            let Some(fresh) = self.client.get_recipe(namespace, name).await? else {
                info!("Recipe {}/{} was deleted after its status was initialized", namespace, name);
                return Ok(ReconcileState::NotFound);
            };
            recipe = fresh;
        }

        if recipe.is_being_deleted() {
            info!("Recipe {}/{} is being deleted", namespace, name);
            return Ok(ReconcileState::PendingDeletion);
        }

        self.ensure_restore_job(&recipe).await;

        let existing = self.client.get_deployment(namespace, name).await?;
        let size = recipe.spec.size;
        match (classify_workload(existing.as_ref(), size), existing) {
            (_, None) => self.create_child(recipe).await,
            (ReconcileState::Converged, Some(_)) => self.mark_available(recipe).await,
            (_, Some(deployment)) => self.resize_child(recipe, deployment).await,
        }
    }

    /// Builds and creates the missing Deployment.
    async fn create_child(&self, recipe: Recipe) -> Result<ReconcileState, ControllerError> {
        let name = recipe.metadata.name.clone().unwrap_or_default();
        let namespace = recipe.metadata.namespace.clone().unwrap_or_default();

        let deployment = match self.builder.build_child_workload(&recipe) {
            Ok(deployment) => deployment,
            Err(e) => {
                error!("Failed to define new Deployment for Recipe {}/{}: {}", namespace, name, e);
                let message =
                    format!("Failed to create Deployment for the custom resource ({name}): ({e})");
                self.record_available(recipe, ConditionStatus::False, REASON_RECONCILING, message)
                    .await?;
                return Err(e.into());
            }
        };

        info!("Creating a new Deployment {}/{}", namespace, name);
        self.client.create_deployment(&deployment).await.map_err(|e| {
            error!("Failed to create new Deployment {}/{}: {}", namespace, name, e);
            e
        })?;

        Ok(ReconcileState::ChildMissing)
    }

    /// Writes the declared replica count onto the existing Deployment.
    async fn resize_child(
        &self,
        recipe: Recipe,
        mut deployment: Deployment,
    ) -> Result<ReconcileState, ControllerError> {
        let name = recipe.metadata.name.clone().unwrap_or_default();
        let namespace = recipe.metadata.namespace.clone().unwrap_or_default();
        let size = recipe.spec.size;

        let current = deployment.spec.as_ref().and_then(|spec| spec.replicas);
        info!(
            "Resizing Deployment {}/{} from {:?} to {} replicas",
            namespace, name, current, size
        );
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(size);

        let Err(e) = self.client.replace_deployment(&deployment).await else {
            return Ok(ReconcileState::ChildDriftedReplicas);
        };
        error!("Failed to update Deployment {}/{}: {}", namespace, name, e);

        // Record against a fresh copy; the snapshot in hand may be stale by now.
        match self.client.get_recipe(&namespace, &name).await {
            Ok(Some(fresh)) => {
                let message =
                    format!("Failed to update the size for the custom resource ({name}): ({e})");
                self.record_available(fresh, ConditionStatus::False, REASON_RESIZING, message)
                    .await?;
            }
            Ok(None) => debug!("Recipe {}/{} disappeared while resizing", namespace, name),
            Err(fetch_err) => {
                error!("Failed to re-fetch Recipe {}/{}: {}", namespace, name, fetch_err);
                return Err(fetch_err.into());
            }
        }
        Err(e.into())
    }

    /// Records that the Deployment matches the declared size.
    async fn mark_available(&self, recipe: Recipe) -> Result<ReconcileState, ControllerError> {
        let name = recipe.metadata.name.clone().unwrap_or_default();
        let message = format!(
            "Deployment for custom resource ({name}) with {} replicas created successfully",
            recipe.spec.size
        );
        self.record_available(recipe, ConditionStatus::True, REASON_RECONCILING, message)
            .await?;
        Ok(ReconcileState::Converged)
    }

    /// Upserts the `Available` condition and persists it.
    async fn record_available(
        &self,
        recipe: Recipe,
        status: ConditionStatus,
        reason: &str,
        message: String,
    ) -> Result<Recipe, ControllerError> {
        let generation = recipe.metadata.generation;
        let stored = update_status_with_retry(self.client.as_ref(), recipe, |recipe_status| {
            recipe_status.set_condition(
                Condition::new(
                    ConditionType::Available,
                    status,
                    reason,
                    message.clone(),
                    Utc::now(),
                )
                .with_observed_generation(generation),
            )
        })
        .await
        .map_err(|e| {
            error!("Failed to update Recipe status: {}", e);
            e
        })?;
        Ok(stored)
    }

    /// Creates the restore Job when the Recipe asks for one and it does not exist yet.
    async fn ensure_restore_job(&self, recipe: &Recipe) {
        let name = recipe.metadata.name.as_deref().unwrap_or_default();
        let namespace = recipe.metadata.namespace.as_deref().unwrap_or_default();

        let job = match self.builder.build_restore_job(recipe) {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to define restore Job for Recipe {}/{}: {}", namespace, name, e);
                return;
            }
        };

        match self.client.get_job(namespace, RESTORE_JOB_NAME).await {
            Ok(Some(_)) => debug!("Restore Job {}/{} already exists", namespace, RESTORE_JOB_NAME),
            Ok(None) => {
                info!("Creating restore Job {}/{} for Recipe {}", namespace, RESTORE_JOB_NAME, name);
                if let Err(e) = self.client.create_job(&job).await {
                    warn!("Failed to create restore Job {}/{}: {}", namespace, RESTORE_JOB_NAME, e);
                }
            }
            Err(e) => warn!("Failed to look up restore Job {}/{}: {}", namespace, RESTORE_JOB_NAME, e),
        }
    }

    /// Get the Fibonacci backoff duration for a resource based on its error count
    ///
    /// Returns (backoff_seconds, error_count)
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                let backoff_seconds = state.backoff.next_backoff_seconds();
                (backoff_seconds, state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (5, 0)
            }
        }
    }

    /// Increment error count for a resource
    pub fn increment_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states
                .entry(resource_key.to_string())
                .or_insert_with(BackoffState::new)
                .increment_error();
        }
    }

    /// Forget the error history of a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
