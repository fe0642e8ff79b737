//! Mock HCloudClient for unit testing
//!
//! This module provides an in-memory implementation of [`HCloudClientTrait`]
//! so the reconcilers can be tested without a Hetzner Cloud project.
//!
//! The mock is organized into resource modules:
//! - `network.rs` - private networks
//! - `load_balancer.rs` - load balancers, services and network attachment
//! - `placement_group.rs` - placement groups
//! - `helpers.rs` - locking, error injection and label filtering
//!
//! Like the real API it assigns IDs, filters list calls by label selector,
//! rejects duplicate names and answers `not_found` for unknown IDs. Tests can
//! queue an error for the next call of an operation with [`MockHCloudClient::fail_next`]
//! and inspect every call made with [`MockHCloudClient::calls`].

mod helpers;
mod load_balancer;
mod network;
mod placement_group;

use crate::client::HCloudClientFactory;
use crate::error::{ErrorCode, HCloudError};
use crate::hcloud_trait::HCloudClientTrait;
use crate::models::*;
use helpers::lock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock HCloudClient for testing
///
/// Clones share the same underlying store, so a test can keep one handle for
/// assertions while the code under test owns another.
#[derive(Clone, Default)]
pub struct MockHCloudClient {
    pub(crate) networks: Arc<Mutex<HashMap<u64, Network>>>,
    pub(crate) load_balancers: Arc<Mutex<HashMap<u64, LoadBalancer>>>,
    pub(crate) placement_groups: Arc<Mutex<HashMap<u64, PlacementGroup>>>,
    // Queued errors per operation name
    pub(crate) injected_errors: Arc<Mutex<HashMap<String, VecDeque<ErrorCode>>>>,
    // Every call made, in order
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockHCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHCloudClient")
            .field("calls", &lock(&self.calls).len())
            .finish_non_exhaustive()
    }
}

impl MockHCloudClient {
    /// Create a new, empty mock client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a network to the mock store (for test setup)
    pub fn add_network(&self, network: Network) {
        self.reserve_id(network.id);
        lock(&self.networks).insert(network.id, network);
    }

    /// Add a load balancer to the mock store (for test setup)
    pub fn add_load_balancer(&self, load_balancer: LoadBalancer) {
        self.reserve_id(load_balancer.id);
        lock(&self.load_balancers).insert(load_balancer.id, load_balancer);
    }

    /// Add a placement group to the mock store (for test setup)
    pub fn add_placement_group(&self, placement_group: PlacementGroup) {
        self.reserve_id(placement_group.id);
        lock(&self.placement_groups).insert(placement_group.id, placement_group);
    }

    /// Snapshot of all stored networks, ordered by ID
    #[must_use]
    pub fn networks(&self) -> Vec<Network> {
        let mut networks: Vec<_> = lock(&self.networks).values().cloned().collect();
        networks.sort_by_key(|n| n.id);
        networks
    }

    /// Snapshot of all stored load balancers, ordered by ID
    #[must_use]
    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        let mut lbs: Vec<_> = lock(&self.load_balancers).values().cloned().collect();
        lbs.sort_by_key(|lb| lb.id);
        lbs
    }

    /// Snapshot of all stored placement groups, ordered by ID
    #[must_use]
    pub fn placement_groups(&self) -> Vec<PlacementGroup> {
        let mut groups: Vec<_> = lock(&self.placement_groups).values().cloned().collect();
        groups.sort_by_key(|pg| pg.id);
        groups
    }

    /// Make the next call of `operation` (e.g. `"create_network"`) fail with `code`
    ///
    /// Several errors can be queued for the same operation; they are returned
    /// in order, one per call.
    pub fn fail_next(&self, operation: &str, code: ErrorCode) {
        lock(&self.injected_errors)
            .entry(operation.to_string())
            .or_default()
            .push_back(code);
    }

    /// Names of every operation called so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of calls to `operation` so far
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == operation).count()
    }

    /// Calls that change remote state (everything except list/get)
    #[must_use]
    pub fn mutating_calls(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| !c.starts_with("list_") && !c.starts_with("get_"))
            .cloned()
            .collect()
    }

    /// Forget recorded calls, keeping the stored resources
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    // Keep generated IDs clear of ones added by hand
    fn reserve_id(&self, id: u64) {
        let mut next = lock(&self.next_id);
        *next = (*next).max(id);
    }

    /// Generate next ID
    pub(crate) fn next_id(&self) -> u64 {
        let mut id = lock(&self.next_id);
        *id += 1;
        *id
    }
}

#[async_trait::async_trait]
impl HCloudClientTrait for MockHCloudClient {
    // Networks - delegated to network module
    async fn list_networks(&self, opts: &ListOpts) -> Result<Vec<Network>, HCloudError> {
        network::list_networks(self, opts)
    }

    async fn get_network(&self, id: u64) -> Result<Network, HCloudError> {
        network::get_network(self, id)
    }

    async fn create_network(&self, opts: CreateNetworkOpts) -> Result<Network, HCloudError> {
        network::create_network(self, opts)
    }

    async fn delete_network(&self, id: u64) -> Result<(), HCloudError> {
        network::delete_network(self, id)
    }

    // Load balancers - delegated to load_balancer module
    async fn list_load_balancers(&self, opts: &ListOpts) -> Result<Vec<LoadBalancer>, HCloudError> {
        load_balancer::list_load_balancers(self, opts)
    }

    async fn create_load_balancer(&self, opts: CreateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
        load_balancer::create_load_balancer(self, opts)
    }

    async fn update_load_balancer(&self, id: u64, opts: UpdateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
        load_balancer::update_load_balancer(self, id, opts)
    }

    async fn change_load_balancer_type(&self, id: u64, load_balancer_type: &str) -> Result<(), HCloudError> {
        load_balancer::change_load_balancer_type(self, id, load_balancer_type)
    }

    async fn change_load_balancer_algorithm(&self, id: u64, algorithm: LoadBalancerAlgorithmType) -> Result<(), HCloudError> {
        load_balancer::change_load_balancer_algorithm(self, id, algorithm)
    }

    async fn attach_load_balancer_to_network(&self, id: u64, opts: AttachToNetworkOpts) -> Result<(), HCloudError> {
        load_balancer::attach_load_balancer_to_network(self, id, opts)
    }

    async fn add_service_to_load_balancer(&self, id: u64, service: LoadBalancerService) -> Result<(), HCloudError> {
        load_balancer::add_service_to_load_balancer(self, id, service)
    }

    async fn delete_service_from_load_balancer(&self, id: u64, listen_port: u16) -> Result<(), HCloudError> {
        load_balancer::delete_service_from_load_balancer(self, id, listen_port)
    }

    async fn delete_load_balancer(&self, id: u64) -> Result<(), HCloudError> {
        load_balancer::delete_load_balancer(self, id)
    }

    // Placement groups - delegated to placement_group module
    async fn list_placement_groups(&self, opts: &ListOpts) -> Result<Vec<PlacementGroup>, HCloudError> {
        placement_group::list_placement_groups(self, opts)
    }

    async fn create_placement_group(&self, opts: CreatePlacementGroupOpts) -> Result<PlacementGroup, HCloudError> {
        placement_group::create_placement_group(self, opts)
    }

    async fn delete_placement_group(&self, id: u64) -> Result<(), HCloudError> {
        placement_group::delete_placement_group(self, id)
    }
}

/// Factory handing out the same [`MockHCloudClient`] for every token
#[derive(Debug, Clone, Default)]
pub struct MockHCloudClientFactory {
    client: MockHCloudClient,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MockHCloudClientFactory {
    /// Create a factory around an existing mock
    #[must_use]
    pub fn new(client: MockHCloudClient) -> Self {
        Self {
            client,
            tokens: Arc::default(),
        }
    }

    /// Tokens the factory was asked to build clients for
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

impl HCloudClientFactory for MockHCloudClientFactory {
    fn new_client(&self, token: &str) -> Result<Arc<dyn HCloudClientTrait>, HCloudError> {
        lock(&self.tokens).push(token.to_string());
        Ok(Arc::new(self.client.clone()))
    }
}
