//! Main controller implementation.
//!
//! Wires the Kubernetes client, the Hetzner Cloud client factory and the
//! event recorder into a [`Reconciler`] and runs the HetznerCluster watcher.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::KubeEventPublisher;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::HetznerCluster;
use hcloud_client::DefaultHCloudClientFactory;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for HetznerCluster resources.
pub struct Controller {
    hetzner_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates the clients and starts the watcher in the background.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing HetznerCluster Controller");

        let kube_client = Client::try_default().await?;

        let hetzner_cluster_api: Api<HetznerCluster> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        // One Hetzner Cloud client per reconcile, built from the cluster's own secret
        let hcloud_factory = Arc::new(DefaultHCloudClientFactory::new(config.hcloud_endpoint.clone()));
        let events = Arc::new(KubeEventPublisher::new(kube_client.clone()));

        let reconciler = Arc::new(Reconciler::new(kube_client, hcloud_factory, events, config));
        let watcher = Watcher::new(reconciler, hetzner_cluster_api);

        let hetzner_cluster_watcher = tokio::spawn(async move { watcher.watch_hetzner_clusters().await });

        Ok(Self {
            hetzner_cluster_watcher,
        })
    }

    /// Runs until the watcher exits or the process is interrupted.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("HetznerCluster Controller running");

        tokio::select! {
            result = &mut self.hetzner_cluster_watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("HetznerCluster watcher panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("HetznerCluster watcher error: {e}")))?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, stopping HetznerCluster Controller");
                self.hetzner_cluster_watcher.abort();
            }
        }

        Ok(())
    }
}
