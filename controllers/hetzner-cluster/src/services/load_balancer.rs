//! Control-plane load balancer of a cluster
//!
//! One owned load balancer fronts the kube-apiserver. Reconciling it walks
//! through: find or create, type/algorithm/name, network attachment, then the
//! extra services next to the fixed kube-apiserver service.

use super::ServiceError;
use crate::reconcile_helpers::{difference, join_errors};
use crate::scope::ClusterScope;
use crds::conditions::{
    self, ConditionSeverity, LOAD_BALANCER_ATTACHED, LOAD_BALANCER_ATTACHED_TO_NETWORK,
    LOAD_BALANCER_ATTACH_FAILED_REASON, LOAD_BALANCER_NO_NETWORK_FOUND_REASON,
    LOAD_BALANCER_UNREACHABLE_REASON,
};
use crds::{LoadBalancerServiceSpec, LoadBalancerSpec, LoadBalancerStatus};
use hcloud_client::{
    AttachToNetworkOpts, CreateLoadBalancerOpts, LoadBalancer, LoadBalancerAlgorithm,
    LoadBalancerAlgorithmType, LoadBalancerService as RemoteService, LoadBalancerServiceProtocol,
    LoadBalancerTargetType, UpdateLoadBalancerOpts,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Length of the random suffix of generated load balancer names
const NAME_SUFFIX_LEN: usize = 5;

pub struct LoadBalancerService<'a> {
    scope: &'a mut ClusterScope,
}

impl<'a> LoadBalancerService<'a> {
    pub fn new(scope: &'a mut ClusterScope) -> Self {
        Self { scope }
    }

    /// Bring the control-plane load balancer in line with the spec.
    pub async fn reconcile(&mut self) -> Result<(), ServiceError> {
        let spec = self.scope.cluster.spec.control_plane_load_balancer.clone();
        if !spec.enabled {
            return Ok(());
        }

        match self.reconcile_load_balancer(&spec).await {
            Ok(()) => {
                conditions::mark_true(self.scope.conditions_mut(), LOAD_BALANCER_ATTACHED);
                Ok(())
            }
            Err(err) => {
                conditions::mark_false(
                    self.scope.conditions_mut(),
                    LOAD_BALANCER_ATTACHED,
                    LOAD_BALANCER_UNREACHABLE_REASON,
                    ConditionSeverity::Error,
                    err.to_string(),
                );
                Err(err)
            }
        }
    }

    async fn reconcile_load_balancer(&mut self, spec: &LoadBalancerSpec) -> Result<(), ServiceError> {
        let lb = match self.find_load_balancer().await? {
            Some(lb) => lb,
            None => self.create_load_balancer(spec).await?,
        };

        let status = self.status_from(&lb);
        self.scope.status_mut().control_plane_load_balancer = Some(status);

        self.reconcile_properties(&lb, spec).await?;
        self.reconcile_network_attachment(&lb).await?;
        self.reconcile_services(&lb, spec).await
    }

    async fn find_load_balancer(&mut self) -> Result<Option<LoadBalancer>, ServiceError> {
        let opts = self.scope.owned_list_opts();
        let hcloud = Arc::clone(&self.scope.hcloud);
        let mut lbs = match hcloud.list_load_balancers(&opts).await {
            Ok(lbs) => lbs,
            Err(e) => return Err(self.scope.hcloud_error("failed to list load balancers", e)),
        };

        if lbs.len() > 1 {
            return Err(ServiceError::Invalid(format!(
                "found {} load balancers with label {}; multiple load balancers are not allowed",
                lbs.len(),
                opts.label_selector.unwrap_or_default()
            )));
        }
        Ok(lbs.pop())
    }

    async fn create_load_balancer(&mut self, spec: &LoadBalancerSpec) -> Result<LoadBalancer, ServiceError> {
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| generated_name(&self.scope.name()));

        let opts = CreateLoadBalancerOpts {
            name: name.clone(),
            load_balancer_type: spec.load_balancer_type.clone(),
            algorithm: LoadBalancerAlgorithm {
                algorithm_type: algorithm_type(spec.algorithm),
            },
            location: Some(spec.region.clone()).filter(|region| !region.is_empty()),
            network: self
                .scope
                .status()
                .and_then(|s| s.network.as_ref())
                .map(|n| n.id),
            labels: self.scope.owned_labels(),
            services: vec![RemoteService {
                protocol: LoadBalancerServiceProtocol::Tcp,
                listen_port: self.scope.cluster.api_server_listen_port(),
                destination_port: spec.port,
                proxyprotocol: false,
            }],
            public_interface: true,
        };

        let hcloud = Arc::clone(&self.scope.hcloud);
        match hcloud.create_load_balancer(opts).await {
            Ok(lb) => {
                info!("Created load balancer {} (ID: {}) for HetznerCluster {}", lb.name, lb.id, self.scope.key());
                self.scope.record_normal(
                    "CreateLoadBalancer",
                    format!("Created load balancer {} with ID {}", lb.name, lb.id),
                );
                Ok(lb)
            }
            Err(e) => {
                self.scope.record_warning(
                    "FailedCreateLoadBalancer",
                    format!("Failed to create load balancer {name}: {e}"),
                );
                Err(self.scope.hcloud_error("failed to create load balancer", e))
            }
        }
    }

    fn status_from(&self, lb: &LoadBalancer) -> LoadBalancerStatus {
        let has_network = self.scope.status().is_some_and(|s| s.network.is_some());
        LoadBalancerStatus {
            id: lb.id,
            ipv4: lb.public_net.ipv4.ip.clone(),
            ipv6: lb.public_net.ipv6.ip.clone(),
            internal_ip: if has_network {
                lb.private_net.first().map(|net| net.ip.clone())
            } else {
                None
            },
            target: lb
                .targets
                .iter()
                .filter_map(|target| match target.target_type {
                    LoadBalancerTargetType::Server => Some(crds::LoadBalancerTarget {
                        target_type: crds::LoadBalancerTargetType::Server,
                        server_id: target.server.as_ref().map(|s| s.id),
                        ip: None,
                    }),
                    LoadBalancerTargetType::Ip => Some(crds::LoadBalancerTarget {
                        target_type: crds::LoadBalancerTargetType::Ip,
                        server_id: None,
                        ip: target.ip.as_ref().map(|ip| ip.ip.clone()),
                    }),
                    LoadBalancerTargetType::LabelSelector => None,
                })
                .collect(),
            protected: lb.protection.delete,
            attached_to_network: !lb.private_net.is_empty(),
        }
    }

    async fn reconcile_network_attachment(&mut self, lb: &LoadBalancer) -> Result<(), ServiceError> {
        if !lb.private_net.is_empty() {
            conditions::mark_true(self.scope.conditions_mut(), LOAD_BALANCER_ATTACHED_TO_NETWORK);
            return Ok(());
        }

        let Some(network_id) = self.scope.status().and_then(|s| s.network.as_ref()).map(|n| n.id) else {
            conditions::mark_false(
                self.scope.conditions_mut(),
                LOAD_BALANCER_ATTACHED_TO_NETWORK,
                LOAD_BALANCER_NO_NETWORK_FOUND_REASON,
                ConditionSeverity::Info,
                "load balancer not attached to a network: no network found",
            );
            return Ok(());
        };

        let hcloud = Arc::clone(&self.scope.hcloud);
        let opts = AttachToNetworkOpts {
            network: network_id,
            ip: None,
        };
        match hcloud.attach_load_balancer_to_network(lb.id, opts).await {
            Ok(()) => {
                info!("Attached load balancer {} to network {}", lb.id, network_id);
            }
            Err(e) if e.is_already_attached() => {
                debug!("Load balancer {} already attached to network {}", lb.id, network_id);
            }
            Err(e) => {
                let err = self.scope.hcloud_error(
                    format!("failed to attach load balancer {} to network {network_id}", lb.id),
                    e,
                );
                if !err.is_rate_limit() {
                    conditions::mark_false(
                        self.scope.conditions_mut(),
                        LOAD_BALANCER_ATTACHED_TO_NETWORK,
                        LOAD_BALANCER_ATTACH_FAILED_REASON,
                        ConditionSeverity::Error,
                        err.to_string(),
                    );
                    self.scope.record_warning("FailedAttachLoadBalancer", err.to_string());
                }
                return Err(err);
            }
        }

        conditions::mark_true(self.scope.conditions_mut(), LOAD_BALANCER_ATTACHED_TO_NETWORK);
        if let Some(status) = self.scope.status_mut().control_plane_load_balancer.as_mut() {
            status.attached_to_network = true;
        }
        Ok(())
    }

    async fn reconcile_properties(&mut self, lb: &LoadBalancer, spec: &LoadBalancerSpec) -> Result<(), ServiceError> {
        let hcloud = Arc::clone(&self.scope.hcloud);
        let mut errors = Vec::new();

        if lb.load_balancer_type.name != spec.load_balancer_type {
            match hcloud.change_load_balancer_type(lb.id, &spec.load_balancer_type).await {
                Ok(()) => self.scope.record_normal(
                    "ChangeLoadBalancerType",
                    format!(
                        "Changed load balancer type from {} to {}",
                        lb.load_balancer_type.name, spec.load_balancer_type
                    ),
                ),
                Err(e) => {
                    let err = self.scope.hcloud_error("failed to change load balancer type", e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        let desired_algorithm = algorithm_type(spec.algorithm);
        if lb.algorithm.algorithm_type != desired_algorithm {
            match hcloud.change_load_balancer_algorithm(lb.id, desired_algorithm).await {
                Ok(()) => self.scope.record_normal(
                    "ChangeLoadBalancerAlgorithm",
                    format!(
                        "Changed load balancer algorithm from {} to {}",
                        lb.algorithm.algorithm_type.as_str(),
                        desired_algorithm.as_str()
                    ),
                ),
                Err(e) => {
                    let err = self.scope.hcloud_error("failed to change load balancer algorithm", e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        // Generated names are kept; only an explicit name is enforced
        if let Some(name) = spec.name.as_ref().filter(|name| **name != lb.name) {
            let opts = UpdateLoadBalancerOpts {
                name: Some(name.clone()),
                labels: None,
            };
            match hcloud.update_load_balancer(lb.id, opts).await {
                Ok(_) => self.scope.record_normal(
                    "ChangeLoadBalancerName",
                    format!("Changed load balancer name from {} to {name}", lb.name),
                ),
                Err(e) => {
                    let err = self.scope.hcloud_error("failed to change load balancer name", e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        join_errors("updating load balancer properties", errors)
    }

    async fn reconcile_services(&mut self, lb: &LoadBalancer, spec: &LoadBalancerSpec) -> Result<(), ServiceError> {
        let api_port = self.scope.cluster.api_server_listen_port();

        let desired: BTreeMap<u16, &LoadBalancerServiceSpec> = spec
            .extra_services
            .iter()
            .filter(|svc| svc.listen_port != api_port)
            .map(|svc| (svc.listen_port, svc))
            .collect();
        let existing = lb
            .services
            .iter()
            .map(|svc| svc.listen_port)
            .filter(|port| *port != api_port);

        let diff = difference(desired.keys().copied(), existing);
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            "Load balancer {}: adding services {:?}, removing services {:?}",
            lb.id, diff.to_create, diff.to_delete
        );

        let hcloud = Arc::clone(&self.scope.hcloud);
        let mut errors = Vec::new();

        for port in &diff.to_delete {
            match hcloud.delete_service_from_load_balancer(lb.id, *port).await {
                Ok(()) => self.scope.record_normal(
                    "DeletedServiceFromLoadBalancer",
                    format!("Deleted service with listen port {port} from load balancer {}", lb.id),
                ),
                Err(e) if e.is_not_found() => {
                    warn!("Service {} of load balancer {} already gone", port, lb.id);
                }
                Err(e) => {
                    let err = self
                        .scope
                        .hcloud_error(format!("failed to delete service with listen port {port}"), e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        for port in &diff.to_create {
            let Some(svc) = desired.get(port) else { continue };
            let service = RemoteService {
                protocol: service_protocol(svc.protocol),
                listen_port: svc.listen_port,
                destination_port: svc.destination_port,
                proxyprotocol: false,
            };
            match hcloud.add_service_to_load_balancer(lb.id, service).await {
                Ok(()) => self.scope.record_normal(
                    "AddedServiceToLoadBalancer",
                    format!(
                        "Added service {} -> {} to load balancer {}",
                        svc.listen_port, svc.destination_port, lb.id
                    ),
                ),
                Err(e) => {
                    let err = self
                        .scope
                        .hcloud_error(format!("failed to add service with listen port {port}"), e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        join_errors("updating load balancer services", errors)
    }

    /// Delete the load balancer recorded in status, unless it is protected.
    pub async fn delete(&mut self) -> Result<(), ServiceError> {
        let Some(status) = self
            .scope
            .status()
            .and_then(|s| s.control_plane_load_balancer.clone())
        else {
            return Ok(());
        };

        if status.protected {
            info!("Load balancer {} of HetznerCluster {} is protected, not deleting", status.id, self.scope.key());
            self.scope.record_normal(
                "LoadBalancerProtectedFromDeletion",
                format!("Load balancer {} is protected from deletion", status.id),
            );
            return Ok(());
        }

        let hcloud = Arc::clone(&self.scope.hcloud);
        match hcloud.delete_load_balancer(status.id).await {
            Ok(()) => {
                info!("Deleted load balancer {} of HetznerCluster {}", status.id, self.scope.key());
            }
            Err(e) if e.is_not_found() => {
                warn!("Load balancer {} of HetznerCluster {} already gone", status.id, self.scope.key());
            }
            Err(e) => {
                self.scope.record_warning(
                    "FailedLoadBalancerDelete",
                    format!("Failed to delete load balancer with ID {}: {e}", status.id),
                );
                return Err(self
                    .scope
                    .hcloud_error(format!("failed to delete load balancer {}", status.id), e));
            }
        }

        self.scope.status_mut().control_plane_load_balancer = None;
        self.scope.record_normal(
            "DeleteLoadBalancer",
            format!("Deleted load balancer with ID {}", status.id),
        );
        Ok(())
    }
}

/// `<cluster>-kube-apiserver-<5 random lowercase alphanumerics>`
fn generated_name(cluster: &str) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(NAME_SUFFIX_LEN)
        .collect();
    format!("{cluster}-kube-apiserver-{suffix}")
}

fn algorithm_type(algorithm: crds::LoadBalancerAlgorithm) -> LoadBalancerAlgorithmType {
    match algorithm {
        crds::LoadBalancerAlgorithm::RoundRobin => LoadBalancerAlgorithmType::RoundRobin,
        crds::LoadBalancerAlgorithm::LeastConnections => LoadBalancerAlgorithmType::LeastConnections,
    }
}

fn service_protocol(protocol: crds::LoadBalancerServiceProtocol) -> LoadBalancerServiceProtocol {
    match protocol {
        crds::LoadBalancerServiceProtocol::Tcp => LoadBalancerServiceProtocol::Tcp,
        crds::LoadBalancerServiceProtocol::Http => LoadBalancerServiceProtocol::Http,
        crds::LoadBalancerServiceProtocol::Https => LoadBalancerServiceProtocol::Https,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_has_short_lowercase_suffix() {
        let name = generated_name("demo");
        let suffix = name.strip_prefix("demo-kube-apiserver-").unwrap();
        assert_eq!(suffix.len(), NAME_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
