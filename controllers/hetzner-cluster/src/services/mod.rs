//! Hetzner Cloud services of a HetznerCluster
//!
//! Each service borrows the [`ClusterScope`](crate::scope::ClusterScope)
//! mutably, reconciles one kind of remote resource and writes what it
//! observed into the cluster status:
//! - `network`: the private network and its subnet
//! - `load_balancer`: the control-plane load balancer
//! - `placement_group`: the placement groups servers are spread across

pub mod load_balancer;
#[cfg(test)]
mod load_balancer_test;
pub mod network;
#[cfg(test)]
mod network_test;
pub mod placement_group;

pub use load_balancer::LoadBalancerService;
pub use network::NetworkService;
pub use placement_group::PlacementGroupService;

use crate::reconcile_helpers::AggregateError;
use hcloud_client::HCloudError;
use thiserror::Error;

/// Errors returned by the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A Hetzner Cloud call failed
    #[error("{context}: {source}")]
    HCloud {
        context: String,
        #[source]
        source: HCloudError,
    },

    /// The API rate limit was hit; the rest of the pass is skipped
    #[error("{context}: rate limit exceeded")]
    RateLimitExceeded {
        context: String,
        #[source]
        source: HCloudError,
    },

    /// A spec field has an unusable value
    #[error("invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    /// The remote state cannot be reconciled safely
    #[error("{0}")]
    Invalid(String),

    /// Several independent operations failed
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl ServiceError {
    /// Wrap a Hetzner Cloud error with the operation it happened in.
    pub fn hcloud(context: impl Into<String>, source: HCloudError) -> Self {
        let context = context.into();
        if source.is_rate_limit() {
            Self::RateLimitExceeded { context, source }
        } else {
            Self::HCloud { context, source }
        }
    }

    /// True if this error, or any aggregated one, is a rate limit
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } => true,
            Self::Aggregate(agg) => agg.errors.iter().any(Self::is_rate_limit),
            _ => false,
        }
    }
}
