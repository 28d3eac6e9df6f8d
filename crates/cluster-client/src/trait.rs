//! ClusterClient trait for mocking
//!
//! This trait abstracts the cluster store so the reconciler can be unit
//! tested against an in-memory implementation.

use crate::error::ClusterError;
use crds::Recipe;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;

/// Store operations used by the Recipe reconciler
///
/// Lookups return `Ok(None)` for a missing object; every other failure is an
/// error. All methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // Recipes
    async fn get_recipe(&self, namespace: &str, name: &str) -> Result<Option<Recipe>, ClusterError>;
    /// Writes `recipe.status` through the status subresource.
    async fn update_recipe_status(&self, recipe: &Recipe) -> Result<Recipe, ClusterError>;

    // Deployments
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError>;
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;
    /// Replaces the whole object; fails with `Conflict` on a stale `resourceVersion`.
    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    // Jobs
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError>;
    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError>;
}
