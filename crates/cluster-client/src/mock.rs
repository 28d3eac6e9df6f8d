//! Mock ClusterClient for unit testing
//!
//! In-memory implementation of [`ClusterClientTrait`]. Objects are keyed by
//! `(namespace, name)` and get a monotonically increasing `resourceVersion`
//! on every write, so stale writes fail with `Conflict` the same way they do
//! against a real API server.
//!
//! Faults can be queued per operation with [`MockClusterClient::inject_fault`];
//! each queued fault is consumed by the next call of that operation.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::Recipe;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use kube::Resource;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

/// Store operations that can be faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetRecipe,
    UpdateRecipeStatus,
    GetDeployment,
    CreateDeployment,
    ReplaceDeployment,
    GetJob,
    CreateJob,
}

/// Failure returned by a faulted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFault {
    NotFound,
    Conflict,
    Api(String),
}

impl MockFault {
    fn into_error(self, operation: MockOperation) -> ClusterError {
        match self {
            Self::NotFound => ClusterError::NotFound(format!("{operation:?}: injected not found")),
            Self::Conflict => ClusterError::Conflict(format!(
                "{operation:?}: the object has been modified; please apply your changes to the latest version and try again"
            )),
            Self::Api(message) => ClusterError::Api(message),
        }
    }
}

/// Mock ClusterClient for testing
#[derive(Clone, Default, Debug)]
pub struct MockClusterClient {
    pub(crate) recipes: Arc<Mutex<HashMap<Key, Recipe>>>,
    pub(crate) deployments: Arc<Mutex<HashMap<Key, Deployment>>>,
    pub(crate) jobs: Arc<Mutex<HashMap<Key, Job>>>,
    pub(crate) faults: Arc<Mutex<HashMap<MockOperation, VecDeque<MockFault>>>>,
    // Write log (for assertions)
    pub(crate) status_writes: Arc<Mutex<Vec<Recipe>>>,
    pub(crate) created_deployments: Arc<Mutex<Vec<Deployment>>>,
    pub(crate) replaced_deployments: Arc<Mutex<Vec<Deployment>>>,
    pub(crate) created_jobs: Arc<Mutex<Vec<Job>>>,
    pub(crate) calls: Arc<Mutex<Vec<MockOperation>>>,
    // Counter for generating resource versions and uids
    pub(crate) next_version: Arc<Mutex<u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key_of<K: Resource>(object: &K) -> Result<Key, ClusterError> {
    let meta = object.meta();
    match (meta.namespace.clone(), meta.name.clone()) {
        (Some(namespace), Some(name)) => Ok((namespace, name)),
        _ => Err(ClusterError::InvalidRequest(
            "object missing metadata.namespace or metadata.name".to_string(),
        )),
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl MockClusterClient {
    /// Create an empty mock store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        let mut version = lock(&self.next_version);
        *version += 1;
        version.to_string()
    }

    /// Stamps a fresh resourceVersion, and a uid if the object has none.
    fn stamp<K: Resource>(&self, object: &mut K) {
        let version = self.next_version();
        let meta = object.meta_mut();
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{version}"));
        }
        meta.resource_version = Some(version);
    }

    fn record(&self, operation: MockOperation) -> Result<(), ClusterError> {
        lock(&self.calls).push(operation);
        let fault = lock(&self.faults)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(fault) => Err(fault.into_error(operation)),
            None => Ok(()),
        }
    }

    /// Queue a fault for the next call of `operation`
    pub fn inject_fault(&self, operation: MockOperation, fault: MockFault) {
        lock(&self.faults).entry(operation).or_default().push_back(fault);
    }

    /// Add a Recipe to the mock store (for test setup)
    pub fn add_recipe(&self, mut recipe: Recipe) -> Recipe {
        self.stamp(&mut recipe);
        if let Ok(k) = key_of(&recipe) {
            lock(&self.recipes).insert(k, recipe.clone());
        }
        recipe
    }

    /// Remove a Recipe from the mock store
    pub fn remove_recipe(&self, namespace: &str, name: &str) {
        lock(&self.recipes).remove(&key(namespace, name));
    }

    /// Add a Deployment to the mock store (for test setup)
    pub fn add_deployment(&self, mut deployment: Deployment) -> Deployment {
        self.stamp(&mut deployment);
        if let Ok(k) = key_of(&deployment) {
            lock(&self.deployments).insert(k, deployment.clone());
        }
        deployment
    }

    /// Add a Job to the mock store (for test setup)
    pub fn add_job(&self, mut job: Job) -> Job {
        self.stamp(&mut job);
        if let Ok(k) = key_of(&job) {
            lock(&self.jobs).insert(k, job.clone());
        }
        job
    }

    /// Current stored Recipe
    #[must_use]
    pub fn recipe(&self, namespace: &str, name: &str) -> Option<Recipe> {
        lock(&self.recipes).get(&key(namespace, name)).cloned()
    }

    /// Current stored Deployment
    #[must_use]
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        lock(&self.deployments).get(&key(namespace, name)).cloned()
    }

    /// Current stored Job
    #[must_use]
    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        lock(&self.jobs).get(&key(namespace, name)).cloned()
    }

    /// Every Recipe passed to a successful status write, in order
    #[must_use]
    pub fn status_writes(&self) -> Vec<Recipe> {
        lock(&self.status_writes).clone()
    }

    /// Every Deployment successfully created, in order
    #[must_use]
    pub fn created_deployments(&self) -> Vec<Deployment> {
        lock(&self.created_deployments).clone()
    }

    /// Every Deployment successfully replaced, in order
    #[must_use]
    pub fn replaced_deployments(&self) -> Vec<Deployment> {
        lock(&self.replaced_deployments).clone()
    }

    /// Every Job successfully created, in order
    #[must_use]
    pub fn created_jobs(&self) -> Vec<Job> {
        lock(&self.created_jobs).clone()
    }

    /// Number of calls made for `operation`, including faulted ones
    #[must_use]
    pub fn call_count(&self, operation: MockOperation) -> usize {
        lock(&self.calls).iter().filter(|op| **op == operation).count()
    }

    /// Optimistic concurrency check: a supplied resourceVersion must match the stored one.
    fn check_version<K: Resource>(incoming: &K, existing: &K) -> Result<(), ClusterError> {
        match &incoming.meta().resource_version {
            Some(version) if Some(version) != existing.meta().resource_version.as_ref() => {
                Err(ClusterError::Conflict(format!(
                    "the object has been modified; resourceVersion {version} is stale"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_recipe(&self, namespace: &str, name: &str) -> Result<Option<Recipe>, ClusterError> {
        self.record(MockOperation::GetRecipe)?;
        Ok(self.recipe(namespace, name))
    }

    async fn update_recipe_status(&self, recipe: &Recipe) -> Result<Recipe, ClusterError> {
        self.record(MockOperation::UpdateRecipeStatus)?;
        let k = key_of(recipe)?;
        let mut recipes = lock(&self.recipes);
        let existing = recipes
            .get_mut(&k)
            .ok_or_else(|| ClusterError::NotFound(format!("recipes {}/{}", k.0, k.1)))?;
        Self::check_version(recipe, existing)?;

        existing.status = recipe.status.clone();
        existing.metadata.resource_version = Some(self.next_version());
        lock(&self.status_writes).push(recipe.clone());
        Ok(existing.clone())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        self.record(MockOperation::GetDeployment)?;
        Ok(self.deployment(namespace, name))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.record(MockOperation::CreateDeployment)?;
        let k = key_of(deployment)?;
        if lock(&self.deployments).contains_key(&k) {
            return Err(ClusterError::Conflict(format!(
                "deployments.apps \"{}\" already exists",
                k.1
            )));
        }
        let mut created = deployment.clone();
        self.stamp(&mut created);
        lock(&self.deployments).insert(k, created.clone());
        lock(&self.created_deployments).push(deployment.clone());
        Ok(created)
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.record(MockOperation::ReplaceDeployment)?;
        let k = key_of(deployment)?;
        let mut deployments = lock(&self.deployments);
        let existing = deployments
            .get_mut(&k)
            .ok_or_else(|| ClusterError::NotFound(format!("deployments.apps {}/{}", k.0, k.1)))?;
        Self::check_version(deployment, existing)?;

        *existing = deployment.clone();
        existing.metadata.resource_version = Some(self.next_version());
        lock(&self.replaced_deployments).push(deployment.clone());
        Ok(existing.clone())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        self.record(MockOperation::GetJob)?;
        Ok(self.job(namespace, name))
    }

    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError> {
        self.record(MockOperation::CreateJob)?;
        let k = key_of(job)?;
        if lock(&self.jobs).contains_key(&k) {
            return Err(ClusterError::Conflict(format!("jobs.batch \"{}\" already exists", k.1)));
        }
        let mut created = job.clone();
        self.stamp(&mut created);
        lock(&self.jobs).insert(k, created.clone());
        lock(&self.created_jobs).push(job.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::RecipeSpec;

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new(
            "r1",
            RecipeSpec {
                size: 1,
                container_port: 80,
                database: Default::default(),
            },
        );
        recipe.metadata.namespace = Some("default".to_string());
        recipe
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() {
        let mock = MockClusterClient::new();
        let stored = mock.add_recipe(recipe());

        let first = mock.update_recipe_status(&stored).await.unwrap();
        assert_ne!(first.metadata.resource_version, stored.metadata.resource_version);

        let err = mock.update_recipe_status(&stored).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_injected_fault_is_consumed_once() {
        let mock = MockClusterClient::new();
        mock.add_recipe(recipe());
        mock.inject_fault(MockOperation::GetRecipe, MockFault::Api("boom".into()));

        assert!(mock.get_recipe("default", "r1").await.is_err());
        assert!(mock.get_recipe("default", "r1").await.unwrap().is_some());
        assert_eq!(mock.call_count(MockOperation::GetRecipe), 2);
    }

    #[tokio::test]
    async fn test_create_existing_deployment_conflicts() {
        let mock = MockClusterClient::new();
        let mut deployment = Deployment::default();
        deployment.metadata.name = Some("r1".into());
        deployment.metadata.namespace = Some("default".into());

        mock.create_deployment(&deployment).await.unwrap();
        let err = mock.create_deployment(&deployment).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(mock.created_deployments().len(), 1);
    }
}
