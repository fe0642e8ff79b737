//! Test utilities for unit testing the services and the reconciler
//!
//! Helpers for building HetznerCluster objects and scopes backed by the
//! in-memory Hetzner Cloud mock.

#[cfg(test)]
use crate::scope::ClusterScope;
#[cfg(test)]
use crds::*;
#[cfg(test)]
use hcloud_client::{Labels, MockHCloudClient};
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use std::sync::Arc;

/// HetznerCluster with the network disabled and a default load balancer
#[cfg(test)]
pub fn create_test_cluster(name: &str, namespace: &str) -> HetznerCluster {
    HetznerCluster {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: HetznerClusterSpec {
            hcloud_network: HCloudNetworkSpec::default(),
            control_plane_regions: vec!["fsn1".to_string()],
            control_plane_endpoint: None,
            control_plane_load_balancer: LoadBalancerSpec {
                region: "fsn1".to_string(),
                ..Default::default()
            },
            hcloud_placement_groups: Vec::new(),
            hetzner_secret_ref: HetznerSecretRef {
                name: "hetzner".to_string(),
                key: HetznerSecretKeyRef::default(),
            },
        },
        status: None,
    }
}

/// HetznerCluster with the private network enabled
#[cfg(test)]
pub fn create_test_cluster_with_network(name: &str, namespace: &str) -> HetznerCluster {
    let mut cluster = create_test_cluster(name, namespace);
    cluster.spec.hcloud_network.enabled = true;
    cluster
}

/// Placement group spec of type spread
#[cfg(test)]
pub fn placement_group_spec(name: &str) -> HCloudPlacementGroupSpec {
    HCloudPlacementGroupSpec {
        name: name.to_string(),
        placement_group_type: PlacementGroupType::Spread,
    }
}

/// Scope over `cluster` talking to `mock`
#[cfg(test)]
pub fn create_test_scope(cluster: HetznerCluster, mock: &MockHCloudClient) -> ClusterScope {
    ClusterScope::new(cluster, Arc::new(mock.clone()))
}

/// Ownership labels of a cluster called `name`
#[cfg(test)]
pub fn owned_labels(name: &str) -> Labels {
    Labels::from([(cluster_tag_key(name), "owned".to_string())])
}
