//! MySQL restore Job for a Recipe

use super::{DesiredStateBuilder, child_identity};
use crate::error::BuildError;
use crds::Recipe;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Fixed name of the restore Job
pub const RESTORE_JOB_NAME: &str = "mysql-restore-job";

const RESTORE_IMAGE: &str = "fradelg/mysql-cron-backup";
const BACKUP_MOUNT_PATH: &str = "/backup";

impl DesiredStateBuilder {
    /// Builds the one-shot restore Job, or `None` when the Recipe does not
    /// ask for an init restore.
    ///
    /// Credentials come from the sibling `<name>-mysql-config` ConfigMap and
    /// `<name>-mysql` Secret by key reference; neither is checked here.
    pub fn build_restore_job(&self, recipe: &Recipe) -> Result<Option<Job>, BuildError> {
        let database = &recipe.spec.database;
        if !database.init_restore {
            return Ok(None);
        }

        let identity = child_identity(recipe)?;
        let config_map = format!("{}-mysql-config", identity.name);
        let secret = format!("{}-mysql", identity.name);
        let volume = format!("{}{}", identity.name, database.backup_policy.volume_name);

        let env = vec![
            EnvVar {
                name: "CRON_TIME".to_string(),
                value: Some(database.backup_policy.schedule.clone()),
                ..Default::default()
            },
            EnvVar {
                name: "INIT_RESTORE_LATEST".to_string(),
                value: Some("1".to_string()),
                ..Default::default()
            },
            config_map_env("MYSQL_HOST", &config_map, "DB_HOST"),
            config_map_env("MYSQL_USER", &config_map, "MYSQL_USER"),
            secret_env("MYSQL_PASSWORD", &secret, "MYSQL_PASSWORD"),
            secret_env("MYSQL_ROOT_PASSWORD", &secret, "MYSQL_ROOT_PASSWORD"),
        ];

        Ok(Some(Job {
            metadata: ObjectMeta {
                name: Some(RESTORE_JOB_NAME.to_string()),
                namespace: Some(identity.namespace),
                owner_references: Some(vec![identity.owner]),
                ..Default::default()
            },
            spec: Some(JobSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: RESTORE_JOB_NAME.to_string(),
                            image: Some(RESTORE_IMAGE.to_string()),
                            image_pull_policy: Some("IfNotPresent".to_string()),
                            env: Some(env),
                            volume_mounts: Some(vec![VolumeMount {
                                name: volume.clone(),
                                mount_path: BACKUP_MOUNT_PATH.to_string(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        volumes: Some(vec![Volume {
                            name: volume.clone(),
                            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                claim_name: volume,
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        restart_policy: Some("OnFailure".to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

fn config_map_env(name: &str, config_map: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: config_map.to_string().into(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string().into(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
