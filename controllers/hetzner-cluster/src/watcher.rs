//! Kubernetes resource watcher.
//!
//! Watches HetznerCluster resources and drives reconciliation through
//! `kube_runtime::Controller`, which handles reconnection, debouncing and
//! per-object serialization.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::HetznerCluster;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{Controller, controller::{Action, Config as RuntimeConfig}, watcher};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Watches HetznerCluster resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    hetzner_cluster_api: Api<HetznerCluster>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, hetzner_cluster_api: Api<HetznerCluster>) -> Self {
        Self {
            reconciler,
            hetzner_cluster_api,
        }
    }

    /// Run the controller loop until the watch stream ends.
    pub async fn watch_hetzner_clusters(&self) -> Result<(), ControllerError> {
        info!("Starting HetznerCluster watcher");

        // Failed clusters come back after a per-cluster Fibonacci backoff
        let error_policy = |obj: Arc<HetznerCluster>, error: &ControllerError, ctx: Arc<Reconciler>| {
            let key = resource_key(&obj);
            let delay = ctx.next_backoff(&key);
            error!(
                "Reconciliation error for HetznerCluster {}: {} (retrying in {}s)",
                key,
                error,
                delay.as_secs()
            );
            Action::requeue(delay)
        };

        let reconcile = |obj: Arc<HetznerCluster>, ctx: Arc<Reconciler>| async move {
            let key = resource_key(&obj);
            debug!("Reconciling HetznerCluster {}", key);
            let action = ctx.reconcile_hetzner_cluster(&obj).await?;
            ctx.reset_backoff(&key);
            Ok::<Action, ControllerError>(action)
        };

        let config = &self.reconciler.config;
        let runtime_config = RuntimeConfig::default()
            .debounce(config.debounce)
            .concurrency(config.concurrency);

        Controller::new(self.hetzner_cluster_api.clone(), watcher::Config::default())
            .with_config(runtime_config)
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled HetznerCluster {}", obj.name),
                    Err(e) => error!("Controller error for HetznerCluster: {}", e),
                }
            })
            .await;

        Ok(())
    }
}

fn resource_key(cluster: &HetznerCluster) -> String {
    format!(
        "{}/{}",
        cluster.namespace().unwrap_or_else(|| "default".to_string()),
        cluster.name_any()
    )
}
