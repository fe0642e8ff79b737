//! Private network spec and status

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default IP range of the network
pub const DEFAULT_CIDR_BLOCK: &str = "10.0.0.0/16";
/// Default IP range of the single subnet
pub const DEFAULT_SUBNET_CIDR_BLOCK: &str = "10.0.0.0/24";
/// Default network zone
pub const DEFAULT_NETWORK_ZONE: &str = "eu-central";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HCloudNetworkSpec {
    /// Whether the cluster uses a private network
    #[serde(default)]
    pub enabled: bool,

    /// Use an existing network by ID instead of looking it up by label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// IP range of the network
    #[serde(default = "default_cidr_block")]
    pub cidr_block: String,

    /// IP range of the subnet servers are attached to
    #[serde(default = "default_subnet_cidr_block")]
    pub subnet_cidr_block: String,

    /// Network zone (`eu-central`, `us-east`, `us-west`, `ap-southeast`)
    #[serde(default = "default_network_zone")]
    pub network_zone: String,
}

impl Default for HCloudNetworkSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            id: None,
            cidr_block: default_cidr_block(),
            subnet_cidr_block: default_subnet_cidr_block(),
            network_zone: default_network_zone(),
        }
    }
}

fn default_cidr_block() -> String {
    DEFAULT_CIDR_BLOCK.to_string()
}

fn default_subnet_cidr_block() -> String {
    DEFAULT_SUBNET_CIDR_BLOCK.to_string()
}

fn default_network_zone() -> String {
    DEFAULT_NETWORK_ZONE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Network ID
    pub id: u64,

    /// Labels on the remote network
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Servers attached to the network
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_servers: Vec<u64>,
}
