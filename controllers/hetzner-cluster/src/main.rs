//! HetznerCluster Controller
//!
//! Reconciles the Hetzner Cloud infrastructure of Cluster API clusters:
//! - a private network with one subnet
//! - the control-plane load balancer and its services
//! - placement groups for spreading servers
//!
//! Remote resources are found through the `caph-cluster-<name>: owned` label
//! and removed again when the HetznerCluster is deleted.

mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod reconcile_helpers;
mod reconciler;
mod scope;
mod services;
mod test_utils;
mod watcher;

use anyhow::{Context, anyhow};
use config::ControllerConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install the rustls crypto provider"))?;

    info!("Starting HetznerCluster Controller");

    let config = ControllerConfig::from_env().context("loading configuration")?;
    info!("Configuration:");
    info!("  Hetzner Cloud endpoint: {}", config.hcloud_endpoint);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Rate limit wait: {}s", config.rate_limit_wait.as_secs());
    info!("  Concurrency: {}, debounce: {}s", config.concurrency, config.debounce.as_secs());

    let controller = Controller::new(config)
        .await
        .context("initializing controller")?;
    controller.run().await?;

    Ok(())
}
