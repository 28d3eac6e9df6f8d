//! Test utilities for unit testing the builder and reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::builder::DesiredStateBuilder;
use crate::config::ImageLookup;
use crate::reconciler::Reconciler;
use cluster_client::MockClusterClient;
use crds::{BackupPolicy, DatabaseSpec, Recipe, RecipeSpec};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_IMAGE: &str = "quay.io/opdev/recipe:v1.2.0";

/// Helper to create a test Recipe with a uid, as the API server would assign
pub fn create_test_recipe(name: &str, size: i32) -> Recipe {
    Recipe {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(format!("{name}-uid")),
            generation: Some(1),
            ..Default::default()
        },
        spec: RecipeSpec {
            size,
            container_port: 8080,
            database: DatabaseSpec::default(),
        },
        status: None,
    }
}

/// Helper to create a test Recipe that asks for an init restore
pub fn create_test_recipe_with_restore(name: &str, size: i32) -> Recipe {
    let mut recipe = create_test_recipe(name, size);
    recipe.spec.database = DatabaseSpec {
        init_restore: true,
        backup_policy: BackupPolicy {
            schedule: "0 3 * * *".to_string(),
            volume_name: "-backup".to_string(),
        },
    };
    recipe
}

/// Helper to create an existing Deployment for a Recipe with `replicas`
pub fn create_test_deployment(name: &str, replicas: Option<i32>) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builder resolving `image`
pub fn create_test_builder(image: Option<&str>) -> DesiredStateBuilder {
    DesiredStateBuilder::new(ImageLookup::fixed(image))
}

/// Reconciler over `mock` with the image lookup resolving `image`
pub fn create_test_reconciler(mock: &MockClusterClient, image: Option<&str>) -> Reconciler {
    Reconciler::new(Arc::new(mock.clone()), create_test_builder(image))
}
