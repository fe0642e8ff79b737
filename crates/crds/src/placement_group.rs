//! Placement group spec and status

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlacementGroupType {
    /// Servers are placed on different physical hosts
    #[default]
    Spread,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HCloudPlacementGroupSpec {
    /// Name without the cluster prefix
    pub name: String,
    #[serde(default, rename = "type")]
    pub placement_group_type: PlacementGroupType,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HCloudPlacementGroupStatus {
    pub id: u64,
    /// Name without the cluster prefix
    pub name: String,
    #[serde(default, rename = "type")]
    pub placement_group_type: PlacementGroupType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<u64>,
}
