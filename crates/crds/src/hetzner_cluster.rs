//! HetznerCluster CRD
//!
//! Infrastructure cluster resource consumed by Cluster API. The controller
//! reconciles its private network, control-plane load balancer and placement
//! groups against the Hetzner Cloud API.

use crate::conditions::Condition;
use crate::labels::{ResourceLifecycle, cluster_tag_key};
use crate::load_balancer::{LoadBalancerSpec, LoadBalancerStatus};
use crate::network::{HCloudNetworkSpec, NetworkStatus};
use crate::placement_group::{HCloudPlacementGroupSpec, HCloudPlacementGroupStatus};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Finalizer guarding deletion of the remote resources
pub const CLUSTER_FINALIZER: &str = "hetznercluster.infrastructure.cluster.x-k8s.io";

/// Default kube-apiserver port
pub const DEFAULT_API_SERVER_PORT: u16 = 6443;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "HetznerCluster",
    namespaced,
    status = "HetznerClusterStatus",
    shortname = "capihc",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.controlPlaneEndpoint.host"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HetznerClusterSpec {
    /// Private network of the cluster
    #[serde(default)]
    pub hcloud_network: HCloudNetworkSpec,

    /// Regions (e.g. `fsn1`, `nbg1`) control-plane machines are spread across
    #[serde(default)]
    pub control_plane_regions: Vec<String>,

    /// Endpoint of the kube-apiserver; filled from the load balancer when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Load balancer in front of the control plane
    #[serde(default)]
    pub control_plane_load_balancer: LoadBalancerSpec,

    /// Placement groups servers can be scheduled into
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hcloud_placement_groups: Vec<HCloudPlacementGroupSpec>,

    /// Secret holding the Hetzner Cloud API token
    pub hetzner_secret_ref: HetznerSecretRef,
}

/// Host and port of an API server
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname or IP
    #[serde(default)]
    pub host: String,
    /// Port
    #[serde(default)]
    pub port: u16,
}

impl ApiEndpoint {
    /// True if both host and port are set
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

/// Reference to the secret with Hetzner credentials
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerSecretRef {
    /// Secret name (same namespace as the cluster)
    pub name: String,
    /// Keys inside the secret
    #[serde(default)]
    pub key: HetznerSecretKeyRef,
}

/// Keys of the Hetzner credential secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerSecretKeyRef {
    /// Key holding the hcloud API token
    #[serde(default = "default_hcloud_token_key")]
    pub hcloud_token: String,
}

impl Default for HetznerSecretKeyRef {
    fn default() -> Self {
        Self {
            hcloud_token: default_hcloud_token_key(),
        }
    }
}

fn default_hcloud_token_key() -> String {
    "hcloud".to_string()
}

/// Failure domain exposed to Cluster API
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainSpec {
    /// Whether control-plane machines may be placed here
    #[serde(default)]
    pub control_plane: bool,
    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerClusterStatus {
    /// Infrastructure is ready for machines
    #[serde(default)]
    pub ready: bool,

    /// Observed private network
    #[serde(default, rename = "networkStatus", skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,

    /// Observed control-plane load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_load_balancer: Option<LoadBalancerStatus>,

    /// Observed placement groups (names without the cluster prefix)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hcloud_placement_groups: Vec<HCloudPlacementGroupStatus>,

    /// Failure domains keyed by region
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_domains: BTreeMap<String, FailureDomainSpec>,

    /// Observations of the cluster state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl HetznerCluster {
    /// Label key marking remote resources of this cluster (`caph-cluster-<name>`)
    #[must_use]
    pub fn cluster_tag_key(&self) -> String {
        cluster_tag_key(&self.name_any())
    }

    /// Labels attached to every remote resource this cluster owns
    #[must_use]
    pub fn owned_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            self.cluster_tag_key(),
            ResourceLifecycle::Owned.as_str().to_string(),
        )])
    }

    /// Listen port of the kube-apiserver service on the load balancer
    #[must_use]
    pub fn api_server_listen_port(&self) -> u16 {
        self.spec
            .control_plane_endpoint
            .as_ref()
            .map(|endpoint| endpoint.port)
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_API_SERVER_PORT)
    }

    /// Status, created on first access
    pub fn status_mut(&mut self) -> &mut HetznerClusterStatus {
        self.status.get_or_insert_with(HetznerClusterStatus::default)
    }
}
