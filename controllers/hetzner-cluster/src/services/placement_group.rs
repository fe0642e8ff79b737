//! Placement groups of a cluster
//!
//! The desired groups are the spec names; the existing ones are the owned
//! remote groups with the `<cluster>-` prefix stripped. Reconciling is plain
//! set reconciliation between the two.

use super::ServiceError;
use crate::reconcile_helpers::{AggregateError, difference, join_errors};
use crate::scope::ClusterScope;
use crds::conditions::{self, ConditionSeverity, PLACEMENT_GROUPS_SYNCED, PLACEMENT_GROUPS_UNREACHABLE_REASON};
use crds::{HCloudPlacementGroupSpec, HCloudPlacementGroupStatus};
use hcloud_client::{CreatePlacementGroupOpts, PlacementGroup, PlacementGroupType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PlacementGroupService<'a> {
    scope: &'a mut ClusterScope,
}

impl<'a> PlacementGroupService<'a> {
    pub fn new(scope: &'a mut ClusterScope) -> Self {
        Self { scope }
    }

    pub async fn reconcile(&mut self) -> Result<(), ServiceError> {
        match self.reconcile_placement_groups().await {
            Ok(()) => {
                conditions::mark_true(self.scope.conditions_mut(), PLACEMENT_GROUPS_SYNCED);
                Ok(())
            }
            Err(err) => {
                conditions::mark_false(
                    self.scope.conditions_mut(),
                    PLACEMENT_GROUPS_SYNCED,
                    PLACEMENT_GROUPS_UNREACHABLE_REASON,
                    ConditionSeverity::Error,
                    err.to_string(),
                );
                Err(err)
            }
        }
    }

    async fn reconcile_placement_groups(&mut self) -> Result<(), ServiceError> {
        self.refresh_status().await?;

        let desired: BTreeMap<String, HCloudPlacementGroupSpec> = self
            .scope
            .cluster
            .spec
            .hcloud_placement_groups
            .iter()
            .map(|pg| (pg.name.clone(), pg.clone()))
            .collect();
        let existing: BTreeMap<String, u64> = self
            .scope
            .status()
            .map(|s| {
                s.hcloud_placement_groups
                    .iter()
                    .map(|pg| (pg.name.clone(), pg.id))
                    .collect()
            })
            .unwrap_or_default();

        let diff = difference(desired.keys().cloned(), existing.keys().cloned());
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            "HetznerCluster {}: creating placement groups {:?}, deleting {:?}",
            self.scope.key(),
            diff.to_create,
            diff.to_delete
        );

        let hcloud = Arc::clone(&self.scope.hcloud);
        let cluster_name = self.scope.name();
        let mut changed = false;

        let mut create_errors = Vec::new();
        for name in &diff.to_create {
            let Some(spec) = desired.get(name) else { continue };
            let opts = CreatePlacementGroupOpts {
                name: format!("{cluster_name}-{name}"),
                placement_group_type: placement_group_type(spec.placement_group_type),
                labels: self.scope.owned_labels(),
            };
            match hcloud.create_placement_group(opts).await {
                Ok(pg) => {
                    info!("Created placement group {} (ID: {})", pg.name, pg.id);
                    changed = true;
                }
                Err(e) => {
                    let err = self
                        .scope
                        .hcloud_error(format!("failed to create placement group {name}"), e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    create_errors.push(err);
                }
            }
        }

        let mut delete_errors = Vec::new();
        for name in &diff.to_delete {
            let Some(id) = existing.get(name).copied() else { continue };
            match hcloud.delete_placement_group(id).await {
                Ok(()) => {
                    info!("Deleted placement group {} (ID: {})", name, id);
                    changed = true;
                }
                Err(e) if e.is_not_found() => {
                    warn!("Placement group {} (ID: {}) already gone", name, id);
                    changed = true;
                }
                Err(e) => {
                    let err = self
                        .scope
                        .hcloud_error(format!("failed to delete placement group {name}"), e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    delete_errors.push(err);
                }
            }
        }

        if changed {
            self.refresh_status().await?;
        }

        let mut errors: Vec<ServiceError> = [
            join_errors("creating placement groups", create_errors),
            join_errors("deleting placement groups", delete_errors),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.len() > 1 {
            return Err(ServiceError::Aggregate(AggregateError {
                context: "reconciling placement groups".to_string(),
                errors,
            }));
        }
        errors.pop().map_or(Ok(()), Err)
    }

    /// List the owned placement groups and rewrite status from them.
    async fn refresh_status(&mut self) -> Result<(), ServiceError> {
        let opts = self.scope.owned_list_opts();
        let hcloud = Arc::clone(&self.scope.hcloud);
        let groups = match hcloud.list_placement_groups(&opts).await {
            Ok(groups) => groups,
            Err(e) => return Err(self.scope.hcloud_error("failed to list placement groups", e)),
        };

        let prefix = format!("{}-", self.scope.name());
        self.scope.status_mut().hcloud_placement_groups = groups
            .into_iter()
            .map(|pg| status_from(pg, &prefix))
            .collect();
        Ok(())
    }

    /// Delete every placement group recorded in status.
    pub async fn delete(&mut self) -> Result<(), ServiceError> {
        let groups = self
            .scope
            .status()
            .map(|s| s.hcloud_placement_groups.clone())
            .unwrap_or_default();
        if groups.is_empty() {
            return Ok(());
        }

        let hcloud = Arc::clone(&self.scope.hcloud);
        let mut remaining = Vec::new();
        let mut errors = Vec::new();

        for pg in groups {
            match hcloud.delete_placement_group(pg.id).await {
                Ok(()) => info!("Deleted placement group {} (ID: {})", pg.name, pg.id),
                Err(e) if e.is_not_found() => {
                    warn!("Placement group {} (ID: {}) already gone", pg.name, pg.id);
                }
                Err(e) => {
                    let err = self
                        .scope
                        .hcloud_error(format!("failed to delete placement group {}", pg.name), e);
                    if err.is_rate_limit() {
                        return Err(err);
                    }
                    errors.push(err);
                    remaining.push(pg);
                }
            }
        }

        let deleted_all = remaining.is_empty();
        self.scope.status_mut().hcloud_placement_groups = remaining;
        if deleted_all {
            self.scope
                .record_normal("PlacementGroupsDeleted", "Deleted all placement groups");
        }
        join_errors("deleting placement groups", errors)
    }
}

fn status_from(pg: PlacementGroup, prefix: &str) -> HCloudPlacementGroupStatus {
    let name = pg
        .name
        .strip_prefix(prefix)
        .map_or_else(|| pg.name.clone(), str::to_string);
    HCloudPlacementGroupStatus {
        id: pg.id,
        name,
        placement_group_type: match pg.placement_group_type {
            PlacementGroupType::Spread => crds::PlacementGroupType::Spread,
        },
        servers: pg.servers,
    }
}

fn placement_group_type(kind: crds::PlacementGroupType) -> PlacementGroupType {
    match kind {
        crds::PlacementGroupType::Spread => PlacementGroupType::Spread,
    }
}
