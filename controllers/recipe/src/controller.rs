//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the store client,
//! builder and reconciler together and runs the Recipe watcher next to the
//! probe/metrics server.

use crate::builder::DesiredStateBuilder;
use crate::config::{ControllerConfig, ImageLookup, RECIPE_IMAGE_ENV};
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, watch_recipes};
use cluster_client::ClusterClient;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Main controller for Recipe management.
pub struct Controller {
    recipe_watcher: JoinHandle<Result<(), ControllerError>>,
    http_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Recipe Controller");

        let kube_client = Client::try_default().await?;
        let cluster_client = ClusterClient::new(kube_client.clone());

        info!("Validating that the Recipe CRD is installed...");
        cluster_client
            .validate_recipe_crd(config.watch_namespace.as_deref())
            .await
            .map_err(|e| {
                error!("Failed to list Recipes: {}", e);
                error!("Please ensure the Recipe CRD is applied and the service account may list it");
                e
            })?;

        let image_lookup = ImageLookup::from_env();
        if image_lookup.resolve().is_none() {
            warn!(
                "{} is not set; Deployments cannot be created until it is",
                RECIPE_IMAGE_ENV
            );
        }

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Reconciler::new(
            Arc::new(cluster_client),
            DesiredStateBuilder::new(image_lookup),
        );
        let ctx = Arc::new(Context {
            reconciler,
            metrics: metrics.clone(),
            reconcile_timeout: config.reconcile_timeout,
        });

        let http_server = tokio::spawn(metrics::serve(config.metrics_bind_address, metrics));
        let recipe_watcher = tokio::spawn(watch_recipes(kube_client, config, ctx));

        Ok(Self {
            recipe_watcher,
            http_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Recipe Controller running");

        let outcome = tokio::select! {
            result = &mut self.recipe_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Recipe watcher panicked: {}", e)))
                    .and_then(|r| r)
            }
            result = &mut self.http_server => {
                result.map_err(|e| ControllerError::Watch(format!("HTTP server panicked: {}", e)))
                    .and_then(|r| r)
            }
        };

        self.recipe_watcher.abort();
        self.http_server.abort();
        info!("Recipe Controller stopped");
        outcome
    }
}
