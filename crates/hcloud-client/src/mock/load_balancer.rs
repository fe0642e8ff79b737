//! Load balancer operations for MockHCloudClient
//!
//! Handles creation, property changes, network attachment and services.

use super::MockHCloudClient;
use super::helpers::{begin_call, lock, matches, name_taken, not_found, selector_of};
use crate::error::{ErrorCode, HCloudError};
use crate::models::*;

pub(crate) fn list_load_balancers(client: &MockHCloudClient, opts: &ListOpts) -> Result<Vec<LoadBalancer>, HCloudError> {
    begin_call(client, "list_load_balancers")?;
    let selector = selector_of(opts)?;

    let mut lbs: Vec<LoadBalancer> = lock(&client.load_balancers)
        .values()
        .filter(|lb| matches(&lb.name, &lb.labels, &selector, opts))
        .cloned()
        .collect();
    lbs.sort_by_key(|lb| lb.id);
    Ok(lbs)
}

pub(crate) fn create_load_balancer(client: &MockHCloudClient, opts: CreateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
    begin_call(client, "create_load_balancer")?;

    if let Some(network_id) = opts.network {
        if !lock(&client.networks).contains_key(&network_id) {
            return Err(not_found("network", network_id));
        }
    }

    let mut lbs = lock(&client.load_balancers);
    if lbs.values().any(|lb| lb.name == opts.name) {
        return Err(name_taken("load balancer", &opts.name));
    }

    let id = client.next_id();
    let private_net = opts
        .network
        .map(|network| LoadBalancerPrivateNet {
            network,
            ip: format!("10.0.255.{}", id % 250 + 1),
        })
        .into_iter()
        .collect();

    let lb = LoadBalancer {
        id,
        name: opts.name,
        public_net: LoadBalancerPublicNet {
            enabled: opts.public_interface,
            ipv4: PublicIp {
                ip: Some(format!("203.0.113.{}", id % 250 + 1)),
            },
            ipv6: PublicIp {
                ip: Some(format!("2001:db8::{id:x}")),
            },
        },
        private_net,
        location: Location {
            name: opts.location.unwrap_or_default(),
            network_zone: String::new(),
        },
        load_balancer_type: LoadBalancerType {
            name: opts.load_balancer_type,
        },
        algorithm: opts.algorithm,
        services: opts.services,
        targets: Vec::new(),
        protection: Protection::default(),
        labels: opts.labels,
    };
    lbs.insert(lb.id, lb.clone());
    Ok(lb)
}

pub(crate) fn update_load_balancer(client: &MockHCloudClient, id: u64, opts: UpdateLoadBalancerOpts) -> Result<LoadBalancer, HCloudError> {
    begin_call(client, "update_load_balancer")?;

    let mut lbs = lock(&client.load_balancers);
    if let Some(name) = opts.name.as_deref() {
        if lbs.values().any(|lb| lb.id != id && lb.name == name) {
            return Err(name_taken("load balancer", name));
        }
    }

    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    if let Some(name) = opts.name {
        lb.name = name;
    }
    if let Some(labels) = opts.labels {
        lb.labels = labels;
    }
    Ok(lb.clone())
}

pub(crate) fn change_load_balancer_type(client: &MockHCloudClient, id: u64, load_balancer_type: &str) -> Result<(), HCloudError> {
    begin_call(client, "change_load_balancer_type")?;
    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    lb.load_balancer_type.name = load_balancer_type.to_string();
    Ok(())
}

pub(crate) fn change_load_balancer_algorithm(client: &MockHCloudClient, id: u64, algorithm: LoadBalancerAlgorithmType) -> Result<(), HCloudError> {
    begin_call(client, "change_load_balancer_algorithm")?;
    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    lb.algorithm.algorithm_type = algorithm;
    Ok(())
}

pub(crate) fn attach_load_balancer_to_network(client: &MockHCloudClient, id: u64, opts: AttachToNetworkOpts) -> Result<(), HCloudError> {
    begin_call(client, "attach_load_balancer_to_network")?;

    if !lock(&client.networks).contains_key(&opts.network) {
        return Err(not_found("network", opts.network));
    }

    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    if lb.private_net.iter().any(|p| p.network == opts.network) {
        return Err(HCloudError::api(
            ErrorCode::LoadBalancerAlreadyAttached,
            format!("load balancer {id} is already attached to network {}", opts.network),
        ));
    }

    lb.private_net.push(LoadBalancerPrivateNet {
        network: opts.network,
        ip: opts.ip.unwrap_or_else(|| format!("10.0.255.{}", id % 250 + 1)),
    });
    Ok(())
}

pub(crate) fn add_service_to_load_balancer(client: &MockHCloudClient, id: u64, service: LoadBalancerService) -> Result<(), HCloudError> {
    begin_call(client, "add_service_to_load_balancer")?;

    if service.listen_port == 0 || service.destination_port == 0 {
        return Err(HCloudError::api(
            ErrorCode::InvalidInput,
            "listen_port and destination_port must be set",
        ));
    }

    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    if lb.services.iter().any(|s| s.listen_port == service.listen_port) {
        return Err(HCloudError::api(
            ErrorCode::Other("source_port_already_used".to_string()),
            format!("listen port {} is already used", service.listen_port),
        ));
    }
    lb.services.push(service);
    Ok(())
}

pub(crate) fn delete_service_from_load_balancer(client: &MockHCloudClient, id: u64, listen_port: u16) -> Result<(), HCloudError> {
    begin_call(client, "delete_service_from_load_balancer")?;

    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get_mut(&id).ok_or_else(|| not_found("load balancer", id))?;
    let before = lb.services.len();
    lb.services.retain(|s| s.listen_port != listen_port);
    if lb.services.len() == before {
        return Err(HCloudError::api(
            ErrorCode::NotFound,
            format!("service with listen port {listen_port} not found"),
        ));
    }
    Ok(())
}

pub(crate) fn delete_load_balancer(client: &MockHCloudClient, id: u64) -> Result<(), HCloudError> {
    begin_call(client, "delete_load_balancer")?;

    let mut lbs = lock(&client.load_balancers);
    let lb = lbs.get(&id).ok_or_else(|| not_found("load balancer", id))?;
    if lb.protection.delete {
        return Err(HCloudError::api(
            ErrorCode::Protected,
            format!("load balancer {id} is protected"),
        ));
    }
    lbs.remove(&id);
    Ok(())
}
