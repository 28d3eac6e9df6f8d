//! Recipe CRD
//!
//! Declares a workload to run: a replicated Deployment plus, optionally,
//! a one-shot MySQL restore Job.

use crate::conditions::{Condition, ConditionType, set_condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a Recipe: replica count, container port and the optional
/// database restore settings.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "devconfcz.opdev.com",
    version = "v1alpha1",
    kind = "Recipe",
    namespaced,
    status = "RecipeStatus",
    printcolumn = r#"{"name": "Size", "type": "integer", "jsonPath": ".spec.size"}"#,
    printcolumn = r#"{"name": "Available", "type": "string", "jsonPath": ".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSpec {
    /// Number of Deployment replicas
    pub size: i32,

    /// Port exposed by the recipe container
    pub container_port: i32,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Restore the latest backup into the database on first start
    #[serde(default)]
    pub init_restore: bool,

    /// Backup schedule and storage
    #[serde(default)]
    pub backup_policy: BackupPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupPolicy {
    /// Cron expression passed to the backup container
    #[serde(default)]
    pub schedule: String,

    /// Suffix of the PersistentVolumeClaim holding backups
    /// (the claim is named `<recipe-name><volumeName>`)
    #[serde(default)]
    pub volume_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStatus {
    /// Latest observations of the Recipe's state, at most one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl RecipeStatus {
    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Upserts a condition. See [`set_condition`].
    pub fn set_condition(&mut self, condition: Condition) -> bool {
        set_condition(&mut self.conditions, condition)
    }
}

impl Recipe {
    /// True when the Recipe has no recorded conditions yet.
    #[must_use]
    pub fn has_no_conditions(&self) -> bool {
        self.status
            .as_ref()
            .is_none_or(|status| status.conditions.is_empty())
    }

    /// True when the store has marked the Recipe for deletion.
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.status.as_ref()?.condition(condition_type)
    }
}
