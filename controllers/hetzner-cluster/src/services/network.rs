//! Private network of a cluster
//!
//! Ensures exactly one owned network with the configured IP range and a
//! single cloud subnet exists, and records it in `status.networkStatus`.

use super::ServiceError;
use crate::reconcile_helpers::parse_cidr;
use crate::scope::ClusterScope;
use crds::conditions::{
    self, ConditionSeverity, NETWORK_ATTACHED, NETWORK_DISABLED_REASON,
    NETWORK_UNREACHABLE_REASON,
};
use crds::{HCloudNetworkSpec, NetworkStatus};
use hcloud_client::{CreateNetworkOpts, Network, NetworkSubnet, NetworkSubnetType};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct NetworkService<'a> {
    scope: &'a mut ClusterScope,
}

impl<'a> NetworkService<'a> {
    pub fn new(scope: &'a mut ClusterScope) -> Self {
        Self { scope }
    }

    /// Find or create the network and record it in status.
    pub async fn reconcile(&mut self) -> Result<(), ServiceError> {
        let spec = self.scope.cluster.spec.hcloud_network.clone();
        if !spec.enabled {
            conditions::mark_false(
                self.scope.conditions_mut(),
                NETWORK_ATTACHED,
                NETWORK_DISABLED_REASON,
                ConditionSeverity::Info,
                "private network is disabled",
            );
            self.scope.status_mut().network = None;
            return Ok(());
        }

        match self.reconcile_network(&spec).await {
            Ok(network) => {
                self.scope.status_mut().network = Some(NetworkStatus {
                    id: network.id,
                    labels: network.labels,
                    attached_servers: network.servers,
                });
                conditions::mark_true(self.scope.conditions_mut(), NETWORK_ATTACHED);
                Ok(())
            }
            Err(err) => {
                conditions::mark_false(
                    self.scope.conditions_mut(),
                    NETWORK_ATTACHED,
                    NETWORK_UNREACHABLE_REASON,
                    ConditionSeverity::Error,
                    err.to_string(),
                );
                Err(err)
            }
        }
    }

    async fn reconcile_network(&mut self, spec: &HCloudNetworkSpec) -> Result<Network, ServiceError> {
        let network = match self.find_network(spec).await? {
            Some(network) => network,
            None => self.create_network(spec).await?,
        };

        if network.subnets.len() > 1 {
            return Err(ServiceError::Invalid(format!(
                "network {} has {} subnets: multiple subnets not allowed",
                network.id,
                network.subnets.len()
            )));
        }
        Ok(network)
    }

    async fn find_network(&mut self, spec: &HCloudNetworkSpec) -> Result<Option<Network>, ServiceError> {
        let hcloud = Arc::clone(&self.scope.hcloud);

        if let Some(id) = spec.id {
            return match hcloud.get_network(id).await {
                Ok(network) => Ok(Some(network)),
                Err(e) if e.is_not_found() => Err(ServiceError::Invalid(format!(
                    "network with ID {id} set in spec.hcloudNetwork.id does not exist"
                ))),
                Err(e) => Err(self.scope.hcloud_error(format!("failed to get network {id}"), e)),
            };
        }

        let opts = self.scope.owned_list_opts();
        let mut networks = match hcloud.list_networks(&opts).await {
            Ok(networks) => networks,
            Err(e) => return Err(self.scope.hcloud_error("failed to list networks", e)),
        };

        if networks.len() > 1 {
            return Err(ServiceError::Invalid(format!(
                "found {} networks with label {}; multiple networks are not allowed",
                networks.len(),
                opts.label_selector.unwrap_or_default()
            )));
        }
        debug!("Found {} owned network(s) for HetznerCluster {}", networks.len(), self.scope.key());
        Ok(networks.pop())
    }

    async fn create_network(&mut self, spec: &HCloudNetworkSpec) -> Result<Network, ServiceError> {
        // Validate before talking to the API
        let ip_range = parse_cidr(&spec.cidr_block, "spec.hcloudNetwork.cidrBlock")?;
        let subnet_range = parse_cidr(&spec.subnet_cidr_block, "spec.hcloudNetwork.subnetCidrBlock")?;

        let opts = CreateNetworkOpts {
            name: self.scope.name(),
            ip_range,
            subnets: vec![NetworkSubnet {
                subnet_type: NetworkSubnetType::Cloud,
                ip_range: subnet_range,
                network_zone: spec.network_zone.clone(),
                gateway: None,
            }],
            labels: self.scope.owned_labels(),
        };

        let hcloud = Arc::clone(&self.scope.hcloud);
        match hcloud.create_network(opts).await {
            Ok(network) => {
                info!(
                    "Created network {} (ID: {}) for HetznerCluster {}",
                    network.name,
                    network.id,
                    self.scope.key()
                );
                self.scope.record_normal(
                    "NetworkCreated",
                    format!("Created network {} with ID {}", network.name, network.id),
                );
                Ok(network)
            }
            Err(e) => {
                self.scope
                    .record_warning("NetworkCreatedFailed", format!("Failed to create network: {e}"));
                Err(self.scope.hcloud_error("failed to create network", e))
            }
        }
    }

    /// Delete the network recorded in status.
    pub async fn delete(&mut self) -> Result<(), ServiceError> {
        let Some(network) = self.scope.status().and_then(|s| s.network.clone()) else {
            return Ok(());
        };
        let id = network.id;

        // Networks adopted through spec.hcloudNetwork.id stay behind
        let owned = self.scope.owned_labels();
        if !owned.iter().all(|(k, v)| network.labels.get(k) == Some(v)) {
            info!(
                "Network {} of HetznerCluster {} is not owned by the cluster, not deleting it",
                id,
                self.scope.key()
            );
            self.scope.status_mut().network = None;
            return Ok(());
        }

        let hcloud = Arc::clone(&self.scope.hcloud);
        match hcloud.delete_network(id).await {
            Ok(()) => {
                info!("Deleted network {} of HetznerCluster {}", id, self.scope.key());
                self.scope.record_normal("NetworkDeleted", format!("Deleted network with ID {id}"));
            }
            Err(e) if e.is_not_found() => {
                warn!("Network {} of HetznerCluster {} already gone", id, self.scope.key());
            }
            Err(e) => {
                self.scope.record_warning(
                    "NetworkDeleteFailed",
                    format!("Failed to delete network with ID {id}: {e}"),
                );
                return Err(self.scope.hcloud_error(format!("failed to delete network {id}"), e));
            }
        }

        self.scope.status_mut().network = None;
        Ok(())
    }
}
