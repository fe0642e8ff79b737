//! Placement group operations for MockHCloudClient

use super::MockHCloudClient;
use super::helpers::{begin_call, lock, matches, name_taken, not_found, selector_of};
use crate::error::HCloudError;
use crate::models::*;

pub(crate) fn list_placement_groups(client: &MockHCloudClient, opts: &ListOpts) -> Result<Vec<PlacementGroup>, HCloudError> {
    begin_call(client, "list_placement_groups")?;
    let selector = selector_of(opts)?;

    let mut groups: Vec<PlacementGroup> = lock(&client.placement_groups)
        .values()
        .filter(|pg| matches(&pg.name, &pg.labels, &selector, opts))
        .cloned()
        .collect();
    groups.sort_by_key(|pg| pg.id);
    Ok(groups)
}

pub(crate) fn create_placement_group(client: &MockHCloudClient, opts: CreatePlacementGroupOpts) -> Result<PlacementGroup, HCloudError> {
    begin_call(client, "create_placement_group")?;

    let mut groups = lock(&client.placement_groups);
    if groups.values().any(|pg| pg.name == opts.name) {
        return Err(name_taken("placement group", &opts.name));
    }

    let group = PlacementGroup {
        id: client.next_id(),
        name: opts.name,
        placement_group_type: opts.placement_group_type,
        servers: Vec::new(),
        labels: opts.labels,
    };
    groups.insert(group.id, group.clone());
    Ok(group)
}

pub(crate) fn delete_placement_group(client: &MockHCloudClient, id: u64) -> Result<(), HCloudError> {
    begin_call(client, "delete_placement_group")?;
    lock(&client.placement_groups)
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| not_found("placement group", id))
}
