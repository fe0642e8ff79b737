//! HetznerCluster reconcile steps
//!
//! The steps here only touch the [`ClusterScope`]; reading the secret,
//! patching the object and publishing events is left to the [`Reconciler`](super::Reconciler).

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::scope::ClusterScope;
use crate::services::{LoadBalancerService, NetworkService, PlacementGroupService, ServiceError};
use chrono::{DateTime, Utc};
use crds::conditions::{
    self, CONTROL_PLANE_ENDPOINT_NOT_SET_REASON, CONTROL_PLANE_ENDPOINT_SET, ConditionSeverity,
    ConditionStatus, HCLOUD_TOKEN_AVAILABLE, HETZNER_API_REACHABLE, RATE_LIMIT_EXCEEDED_REASON,
};
use crds::{ApiEndpoint, Condition, FailureDomainSpec, HetznerCluster};
use k8s_openapi::api::core::v1::Secret;
use std::time::Duration;
use tracing::{debug, info};

/// Requeue delay while the rate-limit wait is active
pub const RATE_LIMIT_RECHECK: Duration = Duration::from_secs(30);

/// Requeue delay after a successful pass, for drift detection
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Run one normal pass over the scope and return when to come back.
pub async fn reconcile_normal(
    scope: &mut ClusterScope,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<Duration, ControllerError> {
    if rate_limit_active(scope.conditions(), config.rate_limit_wait, now) {
        info!(
            "HetznerCluster {} hit the Hetzner Cloud rate limit recently, waiting",
            scope.key()
        );
        return Ok(RATE_LIMIT_RECHECK);
    }
    conditions::mark_true(scope.conditions_mut(), HETZNER_API_REACHABLE);

    set_failure_domains(&mut scope.cluster);

    let result = reconcile_services(scope).await;

    process_control_plane_endpoint(&mut scope.cluster);
    conditions::set_summary(scope.conditions_mut());

    result.map(|()| RESYNC_INTERVAL)
}

/// Network, then load balancer, then placement groups.
///
/// The load balancer joins the network, so a network failure stops the pass.
pub async fn reconcile_services(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    let cluster = scope.key();
    let wrap = |service: &'static str| {
        let cluster = cluster.clone();
        move |source: ServiceError| ControllerError::Reconcile {
            service,
            cluster,
            source,
        }
    };

    NetworkService::new(scope).reconcile().await.map_err(wrap("network"))?;
    LoadBalancerService::new(scope)
        .reconcile()
        .await
        .map_err(wrap("load balancer"))?;
    PlacementGroupService::new(scope)
        .reconcile()
        .await
        .map_err(wrap("placement groups"))?;
    Ok(())
}

/// Delete the remote resources: load balancer, network, placement groups.
pub async fn reconcile_delete(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    let cluster = scope.key();
    let wrap = |service: &'static str| {
        let cluster = cluster.clone();
        move |source: ServiceError| ControllerError::Delete {
            service,
            cluster,
            source,
        }
    };

    LoadBalancerService::new(scope)
        .delete()
        .await
        .map_err(wrap("load balancer"))?;
    NetworkService::new(scope).delete().await.map_err(wrap("network"))?;
    PlacementGroupService::new(scope)
        .delete()
        .await
        .map_err(wrap("placement groups"))?;
    Ok(())
}

/// True while a recent rate limit says to leave the API alone.
pub fn rate_limit_active(conditions: &[Condition], wait: Duration, now: DateTime<Utc>) -> bool {
    let Some(condition) = conditions::get(conditions, HETZNER_API_REACHABLE) else {
        return false;
    };
    if condition.status != ConditionStatus::False
        || condition.reason.as_deref() != Some(RATE_LIMIT_EXCEEDED_REASON)
    {
        return false;
    }
    let Some(since) = condition.last_transition_time else {
        return false;
    };
    let wait = chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero());
    since + wait > now
}

/// One control-plane failure domain per configured region.
pub fn set_failure_domains(cluster: &mut HetznerCluster) {
    let domains = cluster
        .spec
        .control_plane_regions
        .iter()
        .map(|region| {
            (
                region.clone(),
                FailureDomainSpec {
                    control_plane: true,
                    attributes: Default::default(),
                },
            )
        })
        .collect();
    cluster.status_mut().failure_domains = domains;
}

/// Fill the control-plane endpoint from the load balancer and derive readiness.
pub fn process_control_plane_endpoint(cluster: &mut HetznerCluster) {
    let lb_enabled = cluster.spec.control_plane_load_balancer.enabled;
    let lb_port = cluster.spec.control_plane_load_balancer.port;
    let lb_ipv4 = cluster
        .status
        .as_ref()
        .and_then(|s| s.control_plane_load_balancer.as_ref())
        .and_then(|lb| lb.ipv4.clone())
        .filter(|ip| !ip.is_empty());

    if lb_enabled {
        let Some(ipv4) = lb_ipv4 else {
            let status = cluster.status_mut();
            status.ready = false;
            conditions::mark_false(
                &mut status.conditions,
                CONTROL_PLANE_ENDPOINT_SET,
                CONTROL_PLANE_ENDPOINT_NOT_SET_REASON,
                ConditionSeverity::Warning,
                "load balancer has no IPv4 address yet",
            );
            return;
        };

        let endpoint = cluster
            .spec
            .control_plane_endpoint
            .get_or_insert_with(ApiEndpoint::default);
        if endpoint.host.is_empty() {
            endpoint.host = ipv4;
        }
        if endpoint.port == 0 {
            endpoint.port = lb_port;
        }
        debug!("Control-plane endpoint is {}:{}", endpoint.host, endpoint.port);

        let status = cluster.status_mut();
        status.ready = true;
        conditions::mark_true(&mut status.conditions, CONTROL_PLANE_ENDPOINT_SET);
        return;
    }

    let endpoint_set = cluster
        .spec
        .control_plane_endpoint
        .as_ref()
        .is_some_and(ApiEndpoint::is_valid);
    let status = cluster.status_mut();
    status.ready = endpoint_set;
    if endpoint_set {
        conditions::mark_true(&mut status.conditions, CONTROL_PLANE_ENDPOINT_SET);
    } else {
        conditions::mark_false(
            &mut status.conditions,
            CONTROL_PLANE_ENDPOINT_SET,
            CONTROL_PLANE_ENDPOINT_NOT_SET_REASON,
            ConditionSeverity::Warning,
            "load balancer is disabled and spec.controlPlaneEndpoint is not set",
        );
    }
}

/// Why no Hetzner Cloud token could be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenProblem {
    /// The secret does not exist
    SecretMissing,
    /// The key is absent or empty
    TokenEmpty,
}

/// Read the token under `key` from the credential secret.
pub fn token_from_secret(secret: Option<&Secret>, key: &str) -> Result<String, TokenProblem> {
    let secret = secret.ok_or(TokenProblem::SecretMissing)?;
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|value| String::from_utf8(value.0.clone()).ok())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(TokenProblem::TokenEmpty)
}

/// Record a token problem on `HCloudTokenAvailable`.
pub fn mark_token_unavailable(cluster: &mut HetznerCluster, problem: &TokenProblem) {
    let secret_ref = cluster.spec.hetzner_secret_ref.clone();
    let (reason, message) = match problem {
        TokenProblem::SecretMissing => (
            conditions::HETZNER_SECRET_UNREACHABLE_REASON,
            format!("secret {} not found", secret_ref.name),
        ),
        TokenProblem::TokenEmpty => (
            conditions::HCLOUD_CREDENTIALS_INVALID_REASON,
            format!(
                "secret {} has no token under key {}",
                secret_ref.name, secret_ref.key.hcloud_token
            ),
        ),
    };
    let status = cluster.status_mut();
    conditions::mark_false(
        &mut status.conditions,
        HCLOUD_TOKEN_AVAILABLE,
        reason,
        ConditionSeverity::Error,
        message,
    );
    conditions::set_summary(&mut status.conditions);
}
