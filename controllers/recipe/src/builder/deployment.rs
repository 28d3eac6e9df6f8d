//! Deployment for a Recipe

use super::{DesiredStateBuilder, child_identity};
use crate::error::BuildError;
use crds::Recipe;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, PodSecurityContext, PodSpec, PodTemplateSpec,
    SeccompProfile, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Container (and port) name inside the Recipe pod
pub const CONTAINER_NAME: &str = "recipe";

impl DesiredStateBuilder {
    /// Builds the Deployment a Recipe should own.
    ///
    /// Named after the Recipe, in the Recipe's namespace. The pod always runs
    /// under the restricted security profile: non-root, runtime-default
    /// seccomp, no privilege escalation, all capabilities dropped.
    ///
    /// Fails when the operand image is not configured.
    pub fn build_child_workload(&self, recipe: &Recipe) -> Result<Deployment, BuildError> {
        let identity = child_identity(recipe)?;
        let labels = self.labels(&identity.name);
        let image = self.image()?;

        Ok(Deployment {
            metadata: ObjectMeta {
                name: Some(identity.name),
                namespace: Some(identity.namespace),
                owner_references: Some(vec![identity.owner]),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(recipe.spec.size),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        security_context: Some(PodSecurityContext {
                            run_as_non_root: Some(true),
                            seccomp_profile: Some(SeccompProfile {
                                type_: "RuntimeDefault".to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }),
                        containers: vec![Container {
                            name: CONTAINER_NAME.to_string(),
                            image: Some(image),
                            image_pull_policy: Some("IfNotPresent".to_string()),
                            security_context: Some(restricted_container_context()),
                            ports: Some(vec![ContainerPort {
                                container_port: recipe.spec.container_port,
                                name: Some(CONTAINER_NAME.to_string()),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn restricted_container_context() -> SecurityContext {
    SecurityContext {
        run_as_non_root: Some(true),
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
