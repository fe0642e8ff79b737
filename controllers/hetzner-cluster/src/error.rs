//! Controller-specific error types.
//!
//! Service-level failures are [`ServiceError`](crate::services::ServiceError);
//! this module wraps them with the cluster they happened for.

use crate::services::ServiceError;
use hcloud_client::HCloudError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the HetznerCluster controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Hetzner Cloud API error outside of a service
    #[error("Hetzner Cloud error: {0}")]
    HCloud(#[from] HCloudError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The credential secret is missing or unusable
    #[error("Hetzner secret error: {0}")]
    Secret(String),

    /// A service failed while reconciling a cluster
    #[error("failed to reconcile {service} for HetznerCluster {cluster}: {source}")]
    Reconcile {
        service: &'static str,
        cluster: String,
        #[source]
        source: ServiceError,
    },

    /// A service failed while deleting the remote resources of a cluster
    #[error("failed to delete {service} for HetznerCluster {cluster}: {source}")]
    Delete {
        service: &'static str,
        cluster: String,
        #[source]
        source: ServiceError,
    },

    /// Status or spec patch could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// True if the underlying cause is a Hetzner Cloud rate limit
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::Reconcile { source, .. } | Self::Delete { source, .. } => source.is_rate_limit(),
            Self::HCloud(e) => e.is_rate_limit(),
            _ => false,
        }
    }
}
