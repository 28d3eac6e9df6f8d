//! Desired-state builder.
//!
//! Turns a Recipe spec into the child objects the controller keeps in the
//! cluster:
//! - `deployment`: the replicated workload, always present
//! - `job`: the one-shot MySQL restore Job, only when requested
//!
//! Building is pure apart from the image lookup. Every built object carries a
//! controller owner reference back to its Recipe so the store's garbage
//! collector removes it with the Recipe.

mod deployment;
mod job;

pub use job::RESTORE_JOB_NAME;

use crate::config::{ImageLookup, RECIPE_IMAGE_ENV};
use crate::error::BuildError;
use crds::Recipe;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::collections::BTreeMap;

/// Builds child objects for a Recipe.
#[derive(Debug, Clone)]
pub struct DesiredStateBuilder {
    image_lookup: ImageLookup,
}

impl DesiredStateBuilder {
    pub fn new(image_lookup: ImageLookup) -> Self {
        Self { image_lookup }
    }

    /// Resolves the operand image for this build.
    fn image(&self) -> Result<String, BuildError> {
        self.image_lookup
            .resolve()
            .ok_or(BuildError::MissingImage(RECIPE_IMAGE_ENV))
    }

    /// Labels for selecting the Recipe's pods.
    ///
    /// The version label carries the image tag and is left out when the image
    /// is not configured or has no tag.
    pub fn labels(&self, recipe_name: &str) -> BTreeMap<String, String> {
        let image = self.image_lookup.resolve();
        labels_for(recipe_name, image.as_deref())
    }
}

/// See [`DesiredStateBuilder::labels`].
pub(crate) fn labels_for(recipe_name: &str, image: Option<&str>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "Recipe".to_string()),
        ("app.kubernetes.io/instance".to_string(), recipe_name.to_string()),
        ("app.kubernetes.io/part-of".to_string(), "devconf-operator".to_string()),
        ("app.kubernetes.io/created-by".to_string(), "controller-manager".to_string()),
    ]);
    if let Some(tag) = image.and_then(image_tag) {
        labels.insert("app.kubernetes.io/version".to_string(), tag.to_string());
    }
    labels
}

/// Longest value a Kubernetes label may carry
const MAX_LABEL_VALUE_LEN: usize = 63;

/// Tag component of an image reference: the text after the last `:`.
///
/// A `:` that belongs to a registry port (`host:5000/app`) is not a tag.
/// Digest references (`app@sha256:...`) and tags too long for a label value
/// yield `None`.
pub(crate) fn image_tag(image: &str) -> Option<&str> {
    if image.contains('@') {
        return None;
    }
    let (_, tag) = image.rsplit_once(':')?;
    if tag.is_empty() || tag.contains('/') || tag.len() > MAX_LABEL_VALUE_LEN {
        return None;
    }
    Some(tag)
}

/// Name, namespace and owner reference for a child of `recipe`.
pub(crate) struct ChildIdentity {
    pub name: String,
    pub namespace: String,
    pub owner: OwnerReference,
}

pub(crate) fn child_identity(recipe: &Recipe) -> Result<ChildIdentity, BuildError> {
    let name = recipe
        .metadata
        .name
        .clone()
        .ok_or(BuildError::MissingMetadata("name"))?;
    let namespace = recipe
        .metadata
        .namespace
        .clone()
        .ok_or(BuildError::MissingMetadata("namespace"))?;
    let owner = recipe
        .controller_owner_ref(&())
        .ok_or(BuildError::MissingMetadata("uid"))?;
    Ok(ChildIdentity {
        name,
        namespace,
        owner,
    })
}

#[cfg(test)]
mod builder_test;
