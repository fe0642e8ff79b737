//! Reconciliation of HetznerCluster resources.
//!
//! - `cluster`: the reconcile and delete passes over a [`ClusterScope`]
//!
//! This module owns everything that talks to Kubernetes: the finalizer, the
//! credential secret, the spec and status patches and event publishing.

pub mod cluster;
#[cfg(test)]
mod cluster_test;

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::EventPublisher;
use crate::scope::ClusterScope;
use chrono::Utc;
use cluster::TokenProblem;
use crds::conditions::{self, HCLOUD_TOKEN_AVAILABLE};
use crds::{CLUSTER_FINALIZER, HetznerCluster, HetznerClusterStatus};
use hcloud_client::{HCloudClientFactory, HCloudClientTrait};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Status fields cleared with an explicit `null` in the merge patch when unset
const CLEARABLE_STATUS_FIELDS: &[&str] = &[
    "networkStatus",
    "controlPlaneLoadBalancer",
    "hcloudPlacementGroups",
    "failureDomains",
    "conditions",
];

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::default(),
            error_count: 0,
        }
    }
}

/// Reconciles HetznerCluster resources.
pub struct Reconciler {
    client: Client,
    hcloud_factory: Arc<dyn HCloudClientFactory>,
    events: Arc<dyn EventPublisher>,
    pub(crate) config: ControllerConfig,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(
        client: Client,
        hcloud_factory: Arc<dyn HCloudClientFactory>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            client,
            hcloud_factory,
            events,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reconcile one HetznerCluster.
    pub async fn reconcile_hetzner_cluster(&self, cluster: &HetznerCluster) -> Result<Action, ControllerError> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<HetznerCluster> = Api::namespaced(self.client.clone(), &namespace);

        if cluster.meta().deletion_timestamp.is_some() {
            return self.reconcile_delete(&api, cluster).await;
        }
        self.reconcile_normal(&api, cluster).await
    }

    async fn reconcile_normal(&self, api: &Api<HetznerCluster>, cluster: &HetznerCluster) -> Result<Action, ControllerError> {
        self.ensure_finalizer(api, cluster).await?;

        let mut working = cluster.clone();
        let hcloud = match self.hcloud_client(&mut working).await? {
            Ok(hcloud) => hcloud,
            Err(problem) => {
                cluster::mark_token_unavailable(&mut working, &problem);
                self.patch_status(api, cluster, &working).await?;
                return Err(ControllerError::Secret(format!(
                    "no usable Hetzner Cloud token for {}/{}: {problem:?}",
                    namespace_of(cluster),
                    cluster.name_any()
                )));
            }
        };

        let mut scope = ClusterScope::new(working, hcloud);
        let result = cluster::reconcile_normal(&mut scope, &self.config, Utc::now()).await;

        self.persist(api, cluster, &mut scope).await?;
        result.map(Action::requeue)
    }

    async fn reconcile_delete(&self, api: &Api<HetznerCluster>, cluster: &HetznerCluster) -> Result<Action, ControllerError> {
        if !cluster.finalizers().iter().any(|f| f == CLUSTER_FINALIZER) {
            return Ok(Action::await_change());
        }

        let mut working = cluster.clone();
        let hcloud = match self.hcloud_client(&mut working).await? {
            Ok(hcloud) => hcloud,
            Err(TokenProblem::SecretMissing) => {
                // Without credentials nothing can be cleaned up remotely
                warn!(
                    "Secret of HetznerCluster {}/{} is gone, removing finalizer without deleting remote resources",
                    namespace_of(cluster),
                    cluster.name_any()
                );
                self.remove_finalizer(api, cluster).await?;
                return Ok(Action::await_change());
            }
            Err(problem) => {
                cluster::mark_token_unavailable(&mut working, &problem);
                self.patch_status(api, cluster, &working).await?;
                return Err(ControllerError::Secret(format!(
                    "no usable Hetzner Cloud token to delete {}/{}: {problem:?}",
                    namespace_of(cluster),
                    cluster.name_any()
                )));
            }
        };

        let mut scope = ClusterScope::new(working, hcloud);
        let result = cluster::reconcile_delete(&mut scope).await;
        if let Err(err) = result {
            self.persist(api, cluster, &mut scope).await?;
            return Err(err);
        }

        info!("Deleted remote resources of HetznerCluster {}", scope.key());
        self.publish_events(&mut scope).await;
        self.remove_finalizer(api, cluster).await?;
        Ok(Action::await_change())
    }

    /// Build a Hetzner Cloud client from the cluster's credential secret.
    ///
    /// The outer error is a Kubernetes failure; the inner one a missing or
    /// empty token, which is recorded on the cluster by the caller.
    async fn hcloud_client(
        &self,
        cluster: &mut HetznerCluster,
    ) -> Result<Result<Arc<dyn HCloudClientTrait>, TokenProblem>, ControllerError> {
        let namespace = namespace_of(cluster);
        let secret_ref = cluster.spec.hetzner_secret_ref.clone();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);

        let secret = secrets.get_opt(&secret_ref.name).await?;
        let token = match cluster::token_from_secret(secret.as_ref(), &secret_ref.key.hcloud_token) {
            Ok(token) => token,
            Err(problem) => return Ok(Err(problem)),
        };

        let hcloud = self.hcloud_factory.new_client(&token)?;
        conditions::mark_true(&mut cluster.status_mut().conditions, HCLOUD_TOKEN_AVAILABLE);
        Ok(Ok(hcloud))
    }

    async fn ensure_finalizer(&self, api: &Api<HetznerCluster>, cluster: &HetznerCluster) -> Result<(), ControllerError> {
        let mut finalizers = cluster.finalizers().to_vec();
        if finalizers.iter().any(|f| f == CLUSTER_FINALIZER) {
            return Ok(());
        }
        finalizers.push(CLUSTER_FINALIZER.to_string());
        self.patch_finalizers(api, cluster, finalizers).await
    }

    async fn remove_finalizer(&self, api: &Api<HetznerCluster>, cluster: &HetznerCluster) -> Result<(), ControllerError> {
        let finalizers: Vec<String> = cluster
            .finalizers()
            .iter()
            .filter(|f| *f != CLUSTER_FINALIZER)
            .cloned()
            .collect();
        self.patch_finalizers(api, cluster, finalizers).await
    }

    async fn patch_finalizers(
        &self,
        api: &Api<HetznerCluster>,
        cluster: &HetznerCluster,
        finalizers: Vec<String>,
    ) -> Result<(), ControllerError> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        api.patch(&cluster.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated finalizers of HetznerCluster {}/{}", namespace_of(cluster), cluster.name_any());
        Ok(())
    }

    /// Write back what the pass changed and publish its events.
    async fn persist(
        &self,
        api: &Api<HetznerCluster>,
        original: &HetznerCluster,
        scope: &mut ClusterScope,
    ) -> Result<(), ControllerError> {
        if scope.cluster.spec.control_plane_endpoint != original.spec.control_plane_endpoint {
            let patch = serde_json::json!({
                "spec": {
                    "controlPlaneEndpoint": scope.cluster.spec.control_plane_endpoint
                }
            });
            api.patch(&scope.name(), &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!("Set control-plane endpoint of HetznerCluster {}", scope.key());
        }

        self.patch_status(api, original, &scope.cluster).await?;
        self.publish_events(scope).await;
        Ok(())
    }

    async fn patch_status(
        &self,
        api: &Api<HetznerCluster>,
        original: &HetznerCluster,
        updated: &HetznerCluster,
    ) -> Result<(), ControllerError> {
        if updated.status == original.status {
            debug!("Status of HetznerCluster {}/{} unchanged", namespace_of(updated), updated.name_any());
            return Ok(());
        }
        let status = updated.status.clone().unwrap_or_default();
        let patch = Self::create_status_patch(&status)?;
        api.patch_status(&updated.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Merge patch replacing the whole status.
    ///
    /// Fields that are unset are sent as `null` so the merge removes them.
    pub(crate) fn create_status_patch(status: &HetznerClusterStatus) -> Result<serde_json::Value, ControllerError> {
        let mut value = serde_json::to_value(status)?;
        if let Some(object) = value.as_object_mut() {
            for field in CLEARABLE_STATUS_FIELDS {
                object
                    .entry((*field).to_string())
                    .or_insert(serde_json::Value::Null);
            }
        }
        Ok(serde_json::json!({ "status": value }))
    }

    async fn publish_events(&self, scope: &mut ClusterScope) {
        let events = scope.take_events();
        if events.is_empty() {
            return;
        }
        let reference = scope.cluster.object_ref(&());
        for event in &events {
            self.events.publish(&reference, event).await;
        }
    }

    /// Get the Fibonacci backoff for a resource and count the error
    pub fn next_backoff(&self, resource_key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                state.error_count += 1;
                debug!("{} has failed {} time(s) in a row", resource_key, state.error_count);
                state.backoff.next_backoff()
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(60)
            }
        }
    }

    /// Reset the backoff of a resource after a successful reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}

fn namespace_of(cluster: &HetznerCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::NetworkStatus;

    #[test]
    fn test_status_patch_nulls_cleared_fields() {
        let status = HetznerClusterStatus {
            ready: true,
            ..Default::default()
        };
        let patch = Reconciler::create_status_patch(&status).unwrap();

        assert_eq!(patch["status"]["ready"], serde_json::json!(true));
        for field in CLEARABLE_STATUS_FIELDS {
            assert!(patch["status"][field].is_null(), "{field} should be null");
        }
    }

    #[test]
    fn test_status_patch_keeps_set_fields() {
        let status = HetznerClusterStatus {
            network: Some(NetworkStatus {
                id: 7,
                ..Default::default()
            }),
            ..Default::default()
        };
        let patch = Reconciler::create_status_patch(&status).unwrap();

        assert_eq!(patch["status"]["networkStatus"]["id"], serde_json::json!(7));
        assert!(patch["status"]["controlPlaneLoadBalancer"].is_null());
    }
}
