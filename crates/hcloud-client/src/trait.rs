//! HCloudClient trait for mocking
//!
//! This trait abstracts the Hetzner Cloud client so the reconcilers can run
//! against the in-memory mock in unit tests.

use crate::error::HCloudError;
use crate::models::*;

/// Trait for Hetzner Cloud API client operations
///
/// Every list call accepts [`ListOpts`] so callers can filter by the ownership
/// label selector. All async methods must be `Send` to work with Tokio's
/// work-stealing runtime.
#[async_trait::async_trait]
pub trait HCloudClientTrait: Send + Sync {
    // Networks
    async fn list_networks(&self, opts: &ListOpts) -> Result<Vec<Network>, HCloudError>;
    async fn get_network(&self, id: u64) -> Result<Network, HCloudError>;
    async fn create_network(&self, opts: CreateNetworkOpts) -> Result<Network, HCloudError>;
    async fn delete_network(&self, id: u64) -> Result<(), HCloudError>;

    // Load balancers
    async fn list_load_balancers(&self, opts: &ListOpts) -> Result<Vec<LoadBalancer>, HCloudError>;
    async fn create_load_balancer(&self, opts: CreateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError>;
    async fn update_load_balancer(&self, id: u64, opts: UpdateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError>;
    async fn change_load_balancer_type(&self, id: u64, load_balancer_type: &str) -> Result<(), HCloudError>;
    async fn change_load_balancer_algorithm(&self, id: u64, algorithm: LoadBalancerAlgorithmType) -> Result<(), HCloudError>;
    async fn attach_load_balancer_to_network(&self, id: u64, opts: AttachToNetworkOpts) -> Result<(), HCloudError>;
    async fn add_service_to_load_balancer(&self, id: u64, service: LoadBalancerService) -> Result<(), HCloudError>;
    async fn delete_service_from_load_balancer(&self, id: u64, listen_port: u16) -> Result<(), HCloudError>;
    async fn delete_load_balancer(&self, id: u64) -> Result<(), HCloudError>;

    // Placement groups
    async fn list_placement_groups(&self, opts: &ListOpts) -> Result<Vec<PlacementGroup>, HCloudError>;
    async fn create_placement_group(&self, opts: CreatePlacementGroupOpts) -> Result<PlacementGroup, HCloudError>;
    async fn delete_placement_group(&self, id: u64) -> Result<(), HCloudError>;
}
