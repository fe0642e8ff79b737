//! Network operations for MockHCloudClient

use super::MockHCloudClient;
use super::helpers::{begin_call, lock, matches, name_taken, not_found, selector_of};
use crate::error::HCloudError;
use crate::models::*;

pub(crate) fn list_networks(client: &MockHCloudClient, opts: &ListOpts) -> Result<Vec<Network>, HCloudError> {
    begin_call(client, "list_networks")?;
    let selector = selector_of(opts)?;

    let mut networks: Vec<Network> = lock(&client.networks)
        .values()
        .filter(|n| matches(&n.name, &n.labels, &selector, opts))
        .cloned()
        .collect();
    networks.sort_by_key(|n| n.id);
    Ok(networks)
}

pub(crate) fn get_network(client: &MockHCloudClient, id: u64) -> Result<Network, HCloudError> {
    begin_call(client, "get_network")?;
    lock(&client.networks)
        .get(&id)
        .cloned()
        .ok_or_else(|| not_found("network", id))
}

pub(crate) fn create_network(client: &MockHCloudClient, opts: CreateNetworkOpts) -> Result<Network, HCloudError> {
    begin_call(client, "create_network")?;

    let mut networks = lock(&client.networks);
    if networks.values().any(|n| n.name == opts.name) {
        return Err(name_taken("network", &opts.name));
    }

    let network = Network {
        id: client.next_id(),
        name: opts.name,
        ip_range: opts.ip_range,
        subnets: opts.subnets,
        servers: Vec::new(),
        load_balancers: Vec::new(),
        labels: opts.labels,
        protection: Protection::default(),
    };
    networks.insert(network.id, network.clone());
    Ok(network)
}

pub(crate) fn delete_network(client: &MockHCloudClient, id: u64) -> Result<(), HCloudError> {
    begin_call(client, "delete_network")?;
    lock(&client.networks)
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| not_found("network", id))
}
