//! Status conditions
//!
//! A small ledger of named, timestamped observations attached to a resource.
//! The ledger holds at most one condition per [`ConditionType`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// The Deployment exists and matches the declared size
    Available,

    /// The Recipe is being torn down or cannot make progress
    Degraded,
}

impl ConditionType {
    /// Wire name of the condition type
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Degraded => "Degraded",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trilean condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// The condition holds
    True,
    /// The condition does not hold
    False,
    /// The controller cannot tell yet
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        })
    }
}

/// A single observation about one aspect of the resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Short machine-readable reason, e.g. "Reconciling"
    pub reason: String,

    /// Human-readable detail
    #[serde(default)]
    pub message: String,

    /// Last time `status` changed
    pub last_transition_time: DateTime<Utc>,

    /// Generation of the resource this condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Creates a condition stamped with `now` as its transition time.
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            condition_type,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
            observed_generation: None,
        }
    }

    /// Records the generation this condition was computed from.
    #[must_use]
    pub fn with_observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Upserts `new` into `conditions` by type.
///
/// - No condition of that type: appended.
/// - Status differs: replaced, taking `new.last_transition_time`.
/// - Status unchanged: reason, message and observed generation are updated,
///   the existing `last_transition_time` is kept.
///
/// Returns `true` if the ledger changed.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == new.condition_type)
    else {
        conditions.push(new);
        return true;
    };

    if existing.status != new.status {
        *existing = new;
        return true;
    }

    let changed = existing.reason != new.reason
        || existing.message != new.message
        || existing.observed_generation != new.observed_generation;
    existing.reason = new.reason;
    existing.message = new.message;
    existing.observed_generation = new.observed_generation;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn available(status: ConditionStatus, reason: &str, message: &str, now: DateTime<Utc>) -> Condition {
        Condition::new(ConditionType::Available, status, reason, message, now)
    }

    #[test]
    fn test_set_condition_appends_new_type() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            available(ConditionStatus::Unknown, "Reconciling", "Starting reconciliation", at(10)),
        );

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::Unknown);
        assert_eq!(conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_set_condition_same_status_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, available(ConditionStatus::True, "Reconciling", "ok", at(10)));
        let changed = set_condition(&mut conditions, available(ConditionStatus::True, "Reconciling", "ok", at(99)));

        assert!(!changed, "Identical upsert should be a no-op");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_set_condition_same_status_updates_reason_and_message() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, available(ConditionStatus::False, "Reconciling", "first", at(10)));
        let changed = set_condition(&mut conditions, available(ConditionStatus::False, "Resizing", "second", at(20)));

        assert!(changed);
        assert_eq!(conditions[0].reason, "Resizing");
        assert_eq!(conditions[0].message, "second");
        assert_eq!(conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_set_condition_status_change_bumps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, available(ConditionStatus::Unknown, "Reconciling", "start", at(10)));
        let changed = set_condition(&mut conditions, available(ConditionStatus::True, "Reconciling", "done", at(20)));

        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].last_transition_time, at(20));
    }

    #[test]
    fn test_set_condition_keeps_order_across_types() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, available(ConditionStatus::True, "Reconciling", "ok", at(10)));
        set_condition(
            &mut conditions,
            Condition::new(ConditionType::Degraded, ConditionStatus::False, "Reconciling", "", at(11)),
        );
        set_condition(&mut conditions, available(ConditionStatus::False, "Resizing", "boom", at(12)));

        let types: Vec<_> = conditions.iter().map(|c| c.condition_type).collect();
        assert_eq!(types, vec![ConditionType::Available, ConditionType::Degraded]);
        assert_eq!(conditions[0].status, ConditionStatus::False);
    }

    #[test]
    fn test_condition_serializes_with_kubernetes_field_names() {
        let condition = available(ConditionStatus::True, "Reconciling", "ok", at(0))
            .with_observed_generation(Some(3));
        let json = serde_json::to_value(&condition).unwrap();

        assert_eq!(json["type"], "Available");
        assert_eq!(json["status"], "True");
        assert_eq!(json["lastTransitionTime"], "1970-01-01T00:00:00Z");
        assert_eq!(json["observedGeneration"], 3);
    }
}
