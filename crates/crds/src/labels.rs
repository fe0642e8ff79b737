//! Ownership labels
//!
//! Every remote resource created for a cluster carries `caph-cluster-<name>`
//! with a lifecycle value. Discovery of "our" resources relies on this label
//! alone.

/// Prefix of the ownership label key
pub const CLUSTER_TAG_KEY_PREFIX: &str = "caph-cluster-";

/// Ownership label key for a cluster name
#[must_use]
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{CLUSTER_TAG_KEY_PREFIX}{cluster_name}")
}

/// Lifecycle value of the ownership label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLifecycle {
    /// Created and deleted by the cluster
    Owned,
    /// Used by the cluster but managed elsewhere
    Shared,
}

impl ResourceLifecycle {
    /// Label value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owned => "owned",
            Self::Shared => "shared",
        }
    }
}
