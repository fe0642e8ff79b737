//! Hetzner Cloud API client
//!
//! Implements the subset of the Hetzner Cloud REST API (`/v1`) used by the
//! cluster reconcilers: `/networks`, `/load_balancers` and `/placement_groups`.

use crate::common::HttpClient;
use crate::error::HCloudError;
use crate::hcloud_trait::HCloudClientTrait;
use crate::models::*;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Default public API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

#[derive(Debug, Deserialize)]
struct NetworkEnvelope {
    network: Network,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerEnvelope {
    load_balancer: LoadBalancer,
}

#[derive(Debug, Deserialize)]
struct PlacementGroupEnvelope {
    placement_group: PlacementGroup,
}

/// Hetzner Cloud API client
#[derive(Debug)]
pub struct HCloudClient {
    http: HttpClient,
}

impl HCloudClient {
    /// Create a new Hetzner Cloud client
    ///
    /// # Arguments
    /// * `endpoint` - API base URL (e.g., "https://api.hetzner.cloud/v1")
    /// * `token` - Project API token
    pub fn new(endpoint: String, token: String) -> Result<Self, HCloudError> {
        if token.is_empty() {
            return Err(HCloudError::InvalidRequest("hcloud token is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, endpoint, token),
        })
    }

    fn list_filters(opts: &ListOpts) -> Vec<(&'static str, &str)> {
        let mut filters = Vec::new();
        if let Some(selector) = opts.label_selector.as_deref() {
            filters.push(("label_selector", selector));
        }
        if let Some(name) = opts.name.as_deref() {
            filters.push(("name", name));
        }
        filters
    }

    /// POST to a load balancer action endpoint, discarding the returned action
    async fn load_balancer_action(
        &self,
        id: u64,
        action: &str,
        body: serde_json::Value,
    ) -> Result<(), HCloudError> {
        let path = format!("/load_balancers/{id}/actions/{action}");
        let _: serde_json::Value = self.http.post(&path, &body).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl HCloudClientTrait for HCloudClient {
    async fn list_networks(&self, opts: &ListOpts) -> Result<Vec<Network>, HCloudError> {
        self.http
            .fetch_all_pages("/networks", &Self::list_filters(opts), "networks")
            .await
    }

    async fn get_network(&self, id: u64) -> Result<Network, HCloudError> {
        let envelope: NetworkEnvelope = self.http.get(&format!("/networks/{id}")).await?;
        Ok(envelope.network)
    }

    async fn create_network(&self, opts: CreateNetworkOpts) -> Result<Network, HCloudError> {
        let body = serde_json::to_value(&opts)?;
        let envelope: NetworkEnvelope = self.http.post("/networks", &body).await?;
        Ok(envelope.network)
    }

    async fn delete_network(&self, id: u64) -> Result<(), HCloudError> {
        self.http.delete(&format!("/networks/{id}")).await
    }

    async fn list_load_balancers(&self, opts: &ListOpts) -> Result<Vec<LoadBalancer>, HCloudError> {
        self.http
            .fetch_all_pages("/load_balancers", &Self::list_filters(opts), "load_balancers")
            .await
    }

    async fn create_load_balancer(&self, opts: CreateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
        let body = serde_json::to_value(&opts)?;
        let envelope: LoadBalancerEnvelope = self.http.post("/load_balancers", &body).await?;
        Ok(envelope.load_balancer)
    }

    async fn update_load_balancer(&self, id: u64, opts: UpdateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
        let body = serde_json::to_value(&opts)?;
        let envelope: LoadBalancerEnvelope = self
            .http
            .put(&format!("/load_balancers/{id}"), &body)
            .await?;
        Ok(envelope.load_balancer)
    }

    async fn change_load_balancer_type(&self, id: u64, load_balancer_type: &str) -> Result<(), HCloudError> {
        self.load_balancer_action(
            id,
            "change_type",
            serde_json::json!({ "load_balancer_type": load_balancer_type }),
        )
        .await
    }

    async fn change_load_balancer_algorithm(&self, id: u64, algorithm: LoadBalancerAlgorithmType) -> Result<(), HCloudError> {
        self.load_balancer_action(
            id,
            "change_algorithm",
            serde_json::json!({ "type": algorithm.as_str() }),
        )
        .await
    }

    async fn attach_load_balancer_to_network(&self, id: u64, opts: AttachToNetworkOpts) -> Result<(), HCloudError> {
        self.load_balancer_action(id, "attach_to_network", serde_json::to_value(&opts)?)
            .await
    }

    async fn add_service_to_load_balancer(&self, id: u64, service: LoadBalancerService) -> Result<(), HCloudError> {
        self.load_balancer_action(id, "add_service", serde_json::to_value(&service)?)
            .await
    }

    async fn delete_service_from_load_balancer(&self, id: u64, listen_port: u16) -> Result<(), HCloudError> {
        self.load_balancer_action(
            id,
            "delete_service",
            serde_json::json!({ "listen_port": listen_port }),
        )
        .await
    }

    async fn delete_load_balancer(&self, id: u64) -> Result<(), HCloudError> {
        self.http.delete(&format!("/load_balancers/{id}")).await
    }

    async fn list_placement_groups(&self, opts: &ListOpts) -> Result<Vec<PlacementGroup>, HCloudError> {
        self.http
            .fetch_all_pages("/placement_groups", &Self::list_filters(opts), "placement_groups")
            .await
    }

    async fn create_placement_group(&self, opts: CreatePlacementGroupOpts) -> Result<PlacementGroup, HCloudError> {
        let body = serde_json::to_value(&opts)?;
        let envelope: PlacementGroupEnvelope = self.http.post("/placement_groups", &body).await?;
        Ok(envelope.placement_group)
    }

    async fn delete_placement_group(&self, id: u64) -> Result<(), HCloudError> {
        self.http.delete(&format!("/placement_groups/{id}")).await
    }
}

/// Builds API clients from per-cluster tokens
///
/// Each `HetznerCluster` references its own token secret, so the controller
/// cannot hold a single client.
pub trait HCloudClientFactory: Send + Sync {
    /// Create a client authenticated with `token`
    fn new_client(&self, token: &str) -> Result<Arc<dyn HCloudClientTrait>, HCloudError>;
}

/// Factory producing real [`HCloudClient`]s against a fixed endpoint
#[derive(Debug, Clone)]
pub struct DefaultHCloudClientFactory {
    endpoint: String,
}

impl DefaultHCloudClientFactory {
    /// Create a factory for the given API endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for DefaultHCloudClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl HCloudClientFactory for DefaultHCloudClientFactory {
    fn new_client(&self, token: &str) -> Result<Arc<dyn HCloudClientTrait>, HCloudError> {
        let client = HCloudClient::new(self.endpoint.clone(), token.to_string())?;
        Ok(Arc::new(client))
    }
}
