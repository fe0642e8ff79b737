//! Hetzner Cloud API models
//!
//! Request and response types for networks, load balancers and placement groups.
//! Field names follow the API JSON (snake_case).

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label map attached to Hetzner Cloud resources
pub type Labels = BTreeMap<String, String>;

/// Options shared by all list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOpts {
    /// Label selector in `key==value,key2==value2` form
    pub label_selector: Option<String>,
    /// Exact name filter
    pub name: Option<String>,
}

impl ListOpts {
    /// List options filtering by label selector only
    pub fn with_label_selector(selector: impl Into<String>) -> Self {
        Self {
            label_selector: Some(selector.into()),
            name: None,
        }
    }
}

/// Resource protection flags
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Protection {
    /// Resource cannot be deleted while set
    #[serde(default)]
    pub delete: bool,
}

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Private network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    pub id: u64,
    pub name: String,
    pub ip_range: IpNet,
    #[serde(default)]
    pub subnets: Vec<NetworkSubnet>,
    /// IDs of servers attached to the network
    #[serde(default)]
    pub servers: Vec<u64>,
    /// IDs of load balancers attached to the network
    #[serde(default)]
    pub load_balancers: Vec<u64>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub protection: Protection,
}

/// Subnet type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSubnetType {
    /// Cloud servers and load balancers
    #[default]
    Cloud,
    /// Deprecated alias of `cloud`
    Server,
    /// Robot vSwitch coupling
    Vswitch,
}

/// Subnet inside a private network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSubnet {
    #[serde(rename = "type")]
    pub subnet_type: NetworkSubnetType,
    pub ip_range: IpNet,
    pub network_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Create network request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateNetworkOpts {
    pub name: String,
    pub ip_range: IpNet,
    pub subnets: Vec<NetworkSubnet>,
    pub labels: Labels,
}

// ---------------------------------------------------------------------------
// Load balancers
// ---------------------------------------------------------------------------

/// Load balancing algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithmType {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl LoadBalancerAlgorithmType {
    /// Wire representation of the algorithm
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastConnections => "least_connections",
        }
    }
}

/// `algorithm` object of a load balancer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoadBalancerAlgorithm {
    #[serde(rename = "type")]
    pub algorithm_type: LoadBalancerAlgorithmType,
}

/// Service protocol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerServiceProtocol {
    #[default]
    Tcp,
    Http,
    Https,
}

/// A service (listen port → destination port) on a load balancer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerService {
    pub protocol: LoadBalancerServiceProtocol,
    pub listen_port: u16,
    pub destination_port: u16,
    #[serde(default)]
    pub proxyprotocol: bool,
}

/// Public IP of a load balancer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicIp {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Public interface of a load balancer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerPublicNet {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ipv4: PublicIp,
    #[serde(default)]
    pub ipv6: PublicIp,
}

/// Private network attachment of a load balancer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerPrivateNet {
    pub network: u64,
    pub ip: String,
}

/// Location (e.g. `fsn1`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub network_zone: String,
}

/// Load balancer type (e.g. `lb11`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerType {
    pub name: String,
}

/// Kind of load balancer target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerTargetType {
    Server,
    Ip,
    LabelSelector,
}

/// Server reference of a target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetServer {
    pub id: u64,
}

/// IP reference of a target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetIp {
    pub ip: String,
}

/// Target of a load balancer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerTarget {
    #[serde(rename = "type")]
    pub target_type: LoadBalancerTargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<TargetServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<TargetIp>,
}

/// Load balancer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub public_net: LoadBalancerPublicNet,
    #[serde(default)]
    pub private_net: Vec<LoadBalancerPrivateNet>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub load_balancer_type: LoadBalancerType,
    #[serde(default)]
    pub algorithm: LoadBalancerAlgorithm,
    #[serde(default)]
    pub services: Vec<LoadBalancerService>,
    #[serde(default)]
    pub targets: Vec<LoadBalancerTarget>,
    #[serde(default)]
    pub protection: Protection,
    #[serde(default)]
    pub labels: Labels,
}

/// Create load balancer request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateLoadBalancerOpts {
    pub name: String,
    pub load_balancer_type: String,
    pub algorithm: LoadBalancerAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<u64>,
    pub labels: Labels,
    pub services: Vec<LoadBalancerService>,
    pub public_interface: bool,
}

/// Update load balancer request (PUT)
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UpdateLoadBalancerOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
}

/// `attach_to_network` action request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttachToNetworkOpts {
    pub network: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

// ---------------------------------------------------------------------------
// Placement groups
// ---------------------------------------------------------------------------

/// Placement group type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlacementGroupType {
    #[default]
    Spread,
}

/// Placement group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementGroup {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub placement_group_type: PlacementGroupType,
    #[serde(default)]
    pub servers: Vec<u64>,
    #[serde(default)]
    pub labels: Labels,
}

/// Create placement group request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatePlacementGroupOpts {
    pub name: String,
    #[serde(rename = "type")]
    pub placement_group_type: PlacementGroupType,
    pub labels: Labels,
}
