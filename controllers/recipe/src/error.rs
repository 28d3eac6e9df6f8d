//! Controller-specific error types.
//!
//! This module defines error types specific to the Recipe Controller
//! that are not covered by upstream library errors.

use cluster_client::ClusterError;
use thiserror::Error;

/// Errors raised while building desired child objects from a Recipe.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The operand image lookup found nothing
    #[error("Unable to find {0} environment variable with the image")]
    MissingImage(&'static str),

    /// The Recipe lacks metadata needed for the child or its owner reference
    #[error("Recipe is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl BuildError {
    /// True when only operator intervention (setting configuration) can fix this.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingImage(_))
    }
}

/// Errors that can occur in the Recipe Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cluster store error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Desired state could not be built
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconcile exceeded its deadline and was cancelled
    #[error("Reconciliation cancelled after {0:?}")]
    Cancelled(std::time::Duration),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe/metrics server error
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ControllerError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cluster(ClusterError::NotFound(_)) => "not_found",
            Self::Cluster(ClusterError::Conflict(_)) => "conflict",
            Self::Cluster(_) | Self::Kube(_) => "store",
            Self::Build(e) if e.is_configuration() => "configuration",
            Self::Build(_) => "build",
            Self::InvalidConfig(_) => "configuration",
            Self::Cancelled(_) => "cancelled",
            Self::Watch(_) => "watch",
            Self::Metrics(_) | Self::Server(_) => "internal",
        }
    }
}
