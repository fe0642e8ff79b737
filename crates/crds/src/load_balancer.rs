//! Control-plane load balancer spec and status

use crate::hetzner_cluster::DEFAULT_API_SERVER_PORT;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default load balancer type
pub const DEFAULT_LOAD_BALANCER_TYPE: &str = "lb11";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Create a load balancer for the control plane
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name of the load balancer; generated when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Balancing algorithm
    #[serde(default)]
    pub algorithm: LoadBalancerAlgorithm,

    /// Load balancer type (e.g. `lb11`, `lb21`, `lb31`)
    #[serde(default = "default_type", rename = "type")]
    pub load_balancer_type: String,

    /// Destination port of the kube-apiserver service
    #[serde(default = "default_port")]
    pub port: u16,

    /// Services in addition to the kube-apiserver one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_services: Vec<LoadBalancerServiceSpec>,

    /// Location of the load balancer (e.g. `fsn1`)
    #[serde(default)]
    pub region: String,
}

impl Default for LoadBalancerSpec {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            name: None,
            algorithm: LoadBalancerAlgorithm::default(),
            load_balancer_type: default_type(),
            port: default_port(),
            extra_services: Vec::new(),
            region: String::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_type() -> String {
    DEFAULT_LOAD_BALANCER_TYPE.to_string()
}

fn default_port() -> u16 {
    DEFAULT_API_SERVER_PORT
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerServiceProtocol {
    #[default]
    Tcp,
    Http,
    Https,
}

/// Additional service exposed by the load balancer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerServiceSpec {
    #[serde(default)]
    pub protocol: LoadBalancerServiceProtocol,
    pub listen_port: u16,
    pub destination_port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerTargetType {
    Server,
    Ip,
}

/// Target registered on the load balancer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerTarget {
    #[serde(rename = "type")]
    pub target_type: LoadBalancerTargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// Load balancer ID
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    /// IP inside the cluster network
    #[serde(default, rename = "internalIP", skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<LoadBalancerTarget>,
    /// Deletion protection is enabled
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub attached_to_network: bool,
}
