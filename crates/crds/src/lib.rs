//! HetznerCluster CRD Definitions
//!
//! Kubernetes Custom Resource Definitions and shared helpers (conditions,
//! ownership labels) for the Hetzner cluster infrastructure controller.

pub mod conditions;
pub mod hetzner_cluster;
pub mod labels;
pub mod load_balancer;
pub mod network;
pub mod placement_group;

pub use conditions::{Condition, ConditionSeverity, ConditionStatus};
pub use hetzner_cluster::*;
pub use labels::*;
pub use load_balancer::*;
pub use network::*;
pub use placement_group::*;
