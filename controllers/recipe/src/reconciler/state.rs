//! Reconcile outcomes and their requeue policy.

use k8s_openapi::api::apps::v1::Deployment;
use kube_runtime::controller::Action;
use std::fmt;
use std::time::Duration;

/// Delay before revisiting a Recipe whose Deployment was just created
pub const CHILD_CREATED_REQUEUE: Duration = Duration::from_secs(60);

/// Named state a reconcile cycle ends in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// The Recipe no longer exists
    NotFound,
    /// The Recipe carries a deletion marker; the store cascades the rest
    PendingDeletion,
    /// No conditions recorded yet; the cycle writes a baseline and continues
    StatusUninitialized,
    /// The Deployment was absent and has been created
    ChildMissing,
    /// The Deployment's replica count drifted and has been corrected
    ChildDriftedReplicas,
    /// The Deployment matches the declared size
    Converged,
}

/// When the scheduler should revisit the Recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Only on the next watch event
    Never,
    Immediately,
    After(Duration),
}

impl ReconcileState {
    #[must_use]
    pub fn requeue(self) -> Requeue {
        match self {
            Self::ChildMissing => Requeue::After(CHILD_CREATED_REQUEUE),
            Self::ChildDriftedReplicas => Requeue::Immediately,
            Self::NotFound | Self::PendingDeletion | Self::StatusUninitialized | Self::Converged => {
                Requeue::Never
            }
        }
    }

    /// Label used in logs and the `outcome` metric
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PendingDeletion => "pending_deletion",
            Self::StatusUninitialized => "status_uninitialized",
            Self::ChildMissing => "child_missing",
            Self::ChildDriftedReplicas => "child_drifted_replicas",
            Self::Converged => "converged",
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Requeue> for Action {
    fn from(requeue: Requeue) -> Self {
        match requeue {
            Requeue::Never => Action::await_change(),
            Requeue::Immediately => Action::requeue(Duration::ZERO),
            Requeue::After(delay) => Action::requeue(delay),
        }
    }
}

/// Classifies an observed Deployment against the declared size.
///
/// An unset replica count counts as drift.
#[must_use]
pub fn classify_workload(existing: Option<&Deployment>, size: i32) -> ReconcileState {
    match existing {
        None => ReconcileState::ChildMissing,
        Some(deployment) => {
            let replicas = deployment.spec.as_ref().and_then(|spec| spec.replicas);
            if replicas == Some(size) {
                ReconcileState::Converged
            } else {
                ReconcileState::ChildDriftedReplicas
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_deployment;

    #[test]
    fn test_requeue_policy() {
        assert_eq!(ReconcileState::NotFound.requeue(), Requeue::Never);
        assert_eq!(ReconcileState::PendingDeletion.requeue(), Requeue::Never);
        assert_eq!(
            ReconcileState::ChildMissing.requeue(),
            Requeue::After(Duration::from_secs(60))
        );
        assert_eq!(ReconcileState::ChildDriftedReplicas.requeue(), Requeue::Immediately);
        assert_eq!(ReconcileState::Converged.requeue(), Requeue::Never);
    }

    #[test]
    fn test_requeue_into_action() {
        assert_eq!(Action::from(Requeue::Never), Action::await_change());
        assert_eq!(
            Action::from(Requeue::After(CHILD_CREATED_REQUEUE)),
            Action::requeue(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_classify_workload() {
        assert_eq!(classify_workload(None, 3), ReconcileState::ChildMissing);

        let matching = create_test_deployment("r1", Some(3));
        assert_eq!(classify_workload(Some(&matching), 3), ReconcileState::Converged);

        let drifted = create_test_deployment("r1", Some(2));
        assert_eq!(
            classify_workload(Some(&drifted), 5),
            ReconcileState::ChildDriftedReplicas
        );

        let unset = create_test_deployment("r1", None);
        assert_eq!(
            classify_workload(Some(&unset), 1),
            ReconcileState::ChildDriftedReplicas
        );
    }
}
