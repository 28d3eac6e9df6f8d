//! Kubernetes-backed cluster client
//!
//! Implements [`ClusterClientTrait`] on top of `kube::Api`.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::Recipe;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Cluster client backed by the Kubernetes API server
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Create a new cluster client from an existing kube client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Underlying kube client
    #[must_use]
    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    /// Checks that the Recipe CRD is installed and listable.
    ///
    /// Lists at most one Recipe across all namespaces (or `namespace` when
    /// given). A missing CRD surfaces as [`ClusterError::NotFound`].
    pub async fn validate_recipe_crd(&self, namespace: Option<&str>) -> Result<(), ClusterError> {
        let api: Api<Recipe> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        debug!("Validating Recipe CRD is served by the API server");
        api.list(&ListParams::default().limit(1)).await?;
        Ok(())
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.namespaced(namespace);
        debug!("GET {} {}/{}", K::kind(&Default::default()), namespace, name);
        Ok(api.get_opt(name).await?)
    }

    async fn create<K>(&self, object: &K) -> Result<K, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = address(object)?;
        let api: Api<K> = self.namespaced(namespace);
        debug!("CREATE {} {}/{}", K::kind(&Default::default()), namespace, name);
        Ok(api.create(&PostParams::default(), object).await?)
    }
}

/// Namespace and name of an object, both required to address it.
fn address<K: Resource>(object: &K) -> Result<(&str, &str), ClusterError> {
    let meta = object.meta();
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| ClusterError::InvalidRequest("object missing metadata.name".to_string()))?;
    let namespace = meta.namespace.as_deref().ok_or_else(|| {
        ClusterError::InvalidRequest(format!("object {name} missing metadata.namespace"))
    })?;
    Ok((namespace, name))
}

/// Merge patch for the status subresource.
///
/// Carries `metadata.resourceVersion` when known so the API server rejects
/// the write if the Recipe changed since it was read.
pub(crate) fn recipe_status_patch(recipe: &Recipe) -> serde_json::Value {
    let mut patch = serde_json::json!({ "status": recipe.status });
    if let Some(resource_version) = &recipe.metadata.resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": resource_version });
    }
    patch
}

#[async_trait::async_trait]
impl ClusterClientTrait for ClusterClient {
    async fn get_recipe(&self, namespace: &str, name: &str) -> Result<Option<Recipe>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn update_recipe_status(&self, recipe: &Recipe) -> Result<Recipe, ClusterError> {
        let (namespace, name) = address(recipe)?;
        let api: Api<Recipe> = self.namespaced(namespace);
        let patch = recipe_status_patch(recipe);
        debug!("PATCH Recipe {}/{} status", namespace, name);
        Ok(api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        self.create(deployment).await
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (namespace, name) = address(deployment)?;
        let api: Api<Deployment> = self.namespaced(namespace);
        debug!("REPLACE Deployment {}/{}", namespace, name);
        Ok(api.replace(name, &PostParams::default(), deployment).await?)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        self.get_opt(namespace, name).await
    }

    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError> {
        self.create(job).await
    }
}
