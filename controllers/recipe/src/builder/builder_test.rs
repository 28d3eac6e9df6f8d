//! Tests for the desired-state builder

use super::*;
use crate::test_utils::*;
use k8s_openapi::api::core::v1::EnvVar;

fn env_named<'a>(env: &'a [EnvVar], name: &str) -> &'a EnvVar {
    env.iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("missing env var {name}"))
}

#[test]
fn test_labels_for_recipe() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let labels = builder.labels("r1");

    assert_eq!(labels["app.kubernetes.io/name"], "Recipe");
    assert_eq!(labels["app.kubernetes.io/instance"], "r1");
    assert_eq!(labels["app.kubernetes.io/version"], "v1.2.0");
    assert_eq!(labels["app.kubernetes.io/part-of"], "devconf-operator");
    assert_eq!(labels["app.kubernetes.io/created-by"], "controller-manager");
}

#[test]
fn test_version_label_omitted_without_tag() {
    let labels = create_test_builder(None).labels("r1");
    assert!(!labels.contains_key("app.kubernetes.io/version"));

    let labels = create_test_builder(Some("registry:5000/recipe")).labels("r1");
    assert!(!labels.contains_key("app.kubernetes.io/version"));
    assert_eq!(labels.len(), 4);
}

#[test]
fn test_image_tag() {
    assert_eq!(image_tag("quay.io/opdev/recipe:1.0"), Some("1.0"));
    assert_eq!(image_tag("registry:5000/recipe:latest"), Some("latest"));
    assert_eq!(image_tag("registry:5000/recipe"), None);
    assert_eq!(image_tag("recipe"), None);
    assert_eq!(image_tag("recipe:"), None);
}

#[test]
fn test_image_tag_skips_values_labels_cannot_hold() {
    let digest = format!("quay.io/opdev/recipe@sha256:{}", "a".repeat(64));
    assert_eq!(image_tag(&digest), None);
    assert_eq!(image_tag("quay.io/opdev/recipe:v1@sha256:abc"), None);

    let long = format!("recipe:{}", "1".repeat(64));
    assert_eq!(image_tag(&long), None);
    let longest = format!("recipe:{}", "1".repeat(63));
    assert_eq!(image_tag(&longest).map(str::len), Some(63));

    let labels = labels_for("r1", Some(&digest));
    assert!(!labels.contains_key("app.kubernetes.io/version"));
    assert_eq!(labels["app.kubernetes.io/instance"], "r1");
}

#[test]
fn test_build_child_workload() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let recipe = create_test_recipe("r1", 3);

    let deployment = builder.build_child_workload(&recipe).unwrap();

    assert_eq!(deployment.metadata.name.as_deref(), Some("r1"));
    assert_eq!(deployment.metadata.namespace.as_deref(), Some(TEST_NAMESPACE));

    let spec = deployment.spec.as_ref().unwrap();
    assert_eq!(spec.replicas, Some(3));
    let selector = spec.selector.match_labels.as_ref().unwrap();
    assert_eq!(selector["app.kubernetes.io/instance"], "r1");
    assert_eq!(
        spec.template.metadata.as_ref().unwrap().labels.as_ref(),
        Some(selector)
    );

    let container = &spec.template.spec.as_ref().unwrap().containers[0];
    assert_eq!(container.name, "recipe");
    assert_eq!(container.image.as_deref(), Some(TEST_IMAGE));
    assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));
    let port = &container.ports.as_ref().unwrap()[0];
    assert_eq!(port.container_port, 8080);
    assert_eq!(port.name.as_deref(), Some("recipe"));
}

#[test]
fn test_child_workload_security_posture() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let deployment = builder
        .build_child_workload(&create_test_recipe("r1", 1))
        .unwrap();
    let pod = deployment.spec.unwrap().template.spec.unwrap();

    let pod_context = pod.security_context.unwrap();
    assert_eq!(pod_context.run_as_non_root, Some(true));
    assert_eq!(pod_context.seccomp_profile.unwrap().type_, "RuntimeDefault");

    let container_context = pod.containers[0].security_context.clone().unwrap();
    assert_eq!(container_context.run_as_non_root, Some(true));
    assert_eq!(container_context.allow_privilege_escalation, Some(false));
    assert_eq!(
        container_context.capabilities.unwrap().drop,
        Some(vec!["ALL".to_string()])
    );
}

#[test]
fn test_child_workload_owner_reference() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let deployment = builder
        .build_child_workload(&create_test_recipe("r1", 1))
        .unwrap();

    let owners = deployment.metadata.owner_references.unwrap();
    assert_eq!(owners.len(), 1);
    let owner = &owners[0];
    assert_eq!(owner.kind, "Recipe");
    assert_eq!(owner.api_version, "devconfcz.opdev.com/v1alpha1");
    assert_eq!(owner.name, "r1");
    assert_eq!(owner.uid, "r1-uid");
    assert_eq!(owner.controller, Some(true));
}

#[test]
fn test_missing_image_is_an_error() {
    let builder = create_test_builder(None);
    let err = builder
        .build_child_workload(&create_test_recipe("r1", 1))
        .unwrap_err();

    assert!(matches!(err, BuildError::MissingImage("RECIPE_IMAGE")));
    assert!(err.is_configuration());
}

#[test]
fn test_missing_uid_is_an_error() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let mut recipe = create_test_recipe("r1", 1);
    recipe.metadata.uid = None;

    let err = builder.build_child_workload(&recipe).unwrap_err();
    assert!(matches!(err, BuildError::MissingMetadata("uid")));
}

#[test]
fn test_no_restore_job_unless_requested() {
    let builder = create_test_builder(Some(TEST_IMAGE));
    let job = builder
        .build_restore_job(&create_test_recipe("r1", 1))
        .unwrap();
    assert!(job.is_none());
}

#[test]
fn test_restore_job() {
    // The restore job does not need the operand image
    let builder = create_test_builder(None);
    let job = builder
        .build_restore_job(&create_test_recipe_with_restore("r1", 1))
        .unwrap()
        .unwrap();

    assert_eq!(job.metadata.name.as_deref(), Some(RESTORE_JOB_NAME));
    assert_eq!(job.metadata.namespace.as_deref(), Some(TEST_NAMESPACE));
    assert_eq!(job.metadata.owner_references.as_ref().unwrap()[0].name, "r1");

    let pod = job.spec.unwrap().template.spec.unwrap();
    assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));

    let volume = &pod.volumes.as_ref().unwrap()[0];
    assert_eq!(volume.name, "r1-backup");
    assert_eq!(
        volume.persistent_volume_claim.as_ref().unwrap().claim_name,
        "r1-backup"
    );

    let container = &pod.containers[0];
    assert_eq!(container.image.as_deref(), Some("fradelg/mysql-cron-backup"));
    assert_eq!(container.volume_mounts.as_ref().unwrap()[0].mount_path, "/backup");

    let env = container.env.as_ref().unwrap();
    assert_eq!(env_named(env, "CRON_TIME").value.as_deref(), Some("0 3 * * *"));
    assert_eq!(env_named(env, "INIT_RESTORE_LATEST").value.as_deref(), Some("1"));

    let host = env_named(env, "MYSQL_HOST")
        .value_from
        .as_ref()
        .unwrap()
        .config_map_key_ref
        .as_ref()
        .unwrap();
    assert_eq!(host.key, "DB_HOST");

    let password = env_named(env, "MYSQL_ROOT_PASSWORD")
        .value_from
        .as_ref()
        .unwrap()
        .secret_key_ref
        .as_ref()
        .unwrap();
    assert_eq!(password.key, "MYSQL_ROOT_PASSWORD");
}
