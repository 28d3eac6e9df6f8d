//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster state store
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the resource changed since it was read
    /// (stale `resourceVersion`) or already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// API server rejected the request for another reason
    #[error("Kubernetes API error: {0}")]
    Api(String),

    /// Transport, TLS, or client-side failure
    #[error("Kubernetes client error: {0}")]
    Kube(kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing metadata needed to address it
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClusterError {
    /// True for a stale-version or already-exists rejection.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// True when the addressed resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 404 => Self::NotFound(err.to_string()),
            kube::Error::Api(response) if response.code == 409 => Self::Conflict(err.to_string()),
            kube::Error::Api(_) => Self::Api(err.to_string()),
            _ => Self::Kube(err),
        }
    }
}
