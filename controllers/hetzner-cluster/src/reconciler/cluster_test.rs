//! Unit tests for the HetznerCluster reconcile steps

#[cfg(test)]
mod tests {
    use super::super::cluster::*;
    use crate::config::ControllerConfig;
    use crate::test_utils::*;
    use chrono::Utc;
    use crds::conditions::{self, ConditionSeverity, HETZNER_API_REACHABLE, RATE_LIMIT_EXCEEDED_REASON, READY};
    use crds::{ApiEndpoint, LoadBalancerStatus};
    use hcloud_client::{ErrorCode, MockHCloudClient};
    use k8s_openapi::ByteString;
    use k8s_openapi::api::core::v1::Secret;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn full_cluster() -> crds::HetznerCluster {
        let mut cluster = create_test_cluster_with_network("demo", "default");
        cluster.spec.control_plane_regions = vec!["fsn1".to_string(), "nbg1".to_string()];
        cluster.spec.hcloud_placement_groups = vec![placement_group_spec("control-plane")];
        cluster
    }

    fn secret_with(key: &str, value: &str) -> Secret {
        Secret {
            data: Some(BTreeMap::from([(key.to_string(), ByteString(value.as_bytes().to_vec()))])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_pass_creates_everything_and_becomes_ready() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(full_cluster(), &mock);

        let requeue = reconcile_normal(&mut scope, &ControllerConfig::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(requeue, RESYNC_INTERVAL);
        assert_eq!(mock.networks().len(), 1);
        assert_eq!(mock.load_balancers().len(), 1);
        assert_eq!(mock.placement_groups().len(), 1);

        let status = scope.status().unwrap();
        assert!(status.ready);
        assert_eq!(status.failure_domains.len(), 2);
        assert!(status.failure_domains.values().all(|fd| fd.control_plane));
        assert!(conditions::is_true(&status.conditions, READY));

        // Endpoint filled from the load balancer
        let endpoint = scope.cluster.spec.control_plane_endpoint.clone().unwrap();
        let lb = &mock.load_balancers()[0];
        assert_eq!(Some(endpoint.host), lb.public_net.ipv4.ip.clone());
        assert_eq!(endpoint.port, 6443);
    }

    #[tokio::test]
    async fn test_second_pass_makes_no_changes() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(full_cluster(), &mock);
        let config = ControllerConfig::default();

        reconcile_normal(&mut scope, &config, Utc::now()).await.unwrap();
        let status_after_first = scope.status().cloned();
        mock.clear_calls();
        reconcile_normal(&mut scope, &config, Utc::now()).await.unwrap();

        assert!(mock.mutating_calls().is_empty(), "calls: {:?}", mock.mutating_calls());
        assert_eq!(scope.status().cloned(), status_after_first);
    }

    #[tokio::test]
    async fn test_service_error_names_service_and_cluster() {
        let mock = MockHCloudClient::new();
        mock.fail_next("create_network", ErrorCode::ServiceError);
        let mut scope = create_test_scope(full_cluster(), &mock);

        let err = reconcile_normal(&mut scope, &ControllerConfig::default(), Utc::now())
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed to reconcile network for HetznerCluster default/demo:"));
        // The pass stops at the network
        assert_eq!(mock.call_count("create_load_balancer"), 0);
        assert!(conditions::is_false(scope.conditions(), READY));
    }

    #[tokio::test]
    async fn test_recent_rate_limit_skips_the_api() {
        let mock = MockHCloudClient::new();
        mock.fail_next("list_networks", ErrorCode::RateLimitExceeded);
        let mut scope = create_test_scope(full_cluster(), &mock);
        let config = ControllerConfig::default();

        let err = reconcile_normal(&mut scope, &config, Utc::now()).await.unwrap_err();
        assert!(err.is_rate_limit());

        mock.clear_calls();
        let requeue = reconcile_normal(&mut scope, &config, Utc::now()).await.unwrap();

        assert_eq!(requeue, RATE_LIMIT_RECHECK);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_wait_expires() {
        let mock = MockHCloudClient::new();
        mock.fail_next("list_networks", ErrorCode::RateLimitExceeded);
        let mut scope = create_test_scope(full_cluster(), &mock);
        let config = ControllerConfig::default();

        assert!(reconcile_normal(&mut scope, &config, Utc::now()).await.is_err());

        let later = Utc::now() + chrono::Duration::seconds(301);
        let requeue = reconcile_normal(&mut scope, &config, later).await.unwrap();

        assert_eq!(requeue, RESYNC_INTERVAL);
        assert!(conditions::is_true(scope.conditions(), HETZNER_API_REACHABLE));
    }

    #[test]
    fn test_rate_limit_active_only_for_rate_limit_reason() {
        let now = Utc::now();
        let wait = Duration::from_secs(300);
        let mut conds = Vec::new();
        assert!(!rate_limit_active(&conds, wait, now));

        conditions::mark_false(&mut conds, HETZNER_API_REACHABLE, "SomethingElse", ConditionSeverity::Error, "x");
        assert!(!rate_limit_active(&conds, wait, now));

        conditions::mark_false(&mut conds, HETZNER_API_REACHABLE, RATE_LIMIT_EXCEEDED_REASON, ConditionSeverity::Warning, "x");
        assert!(rate_limit_active(&conds, wait, now));
        assert!(!rate_limit_active(&conds, wait, now + chrono::Duration::seconds(600)));
    }

    #[tokio::test]
    async fn test_delete_order_is_load_balancer_network_placement_groups() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(full_cluster(), &mock);
        reconcile_normal(&mut scope, &ControllerConfig::default(), Utc::now())
            .await
            .unwrap();
        mock.clear_calls();

        reconcile_delete(&mut scope).await.unwrap();

        assert_eq!(
            mock.mutating_calls(),
            vec!["delete_load_balancer", "delete_network", "delete_placement_group"]
        );
        assert!(mock.networks().is_empty());
        assert!(mock.load_balancers().is_empty());
        assert!(mock.placement_groups().is_empty());
    }

    #[tokio::test]
    async fn test_delete_error_is_wrapped() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(full_cluster(), &mock);
        reconcile_normal(&mut scope, &ControllerConfig::default(), Utc::now())
            .await
            .unwrap();
        mock.fail_next("delete_network", ErrorCode::Locked);

        let err = reconcile_delete(&mut scope).await.unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed to delete network for HetznerCluster default/demo:"));
        assert_eq!(mock.call_count("delete_placement_group"), 0);
    }

    #[test]
    fn test_endpoint_waits_for_load_balancer_ip() {
        let mut cluster = create_test_cluster("demo", "default");

        process_control_plane_endpoint(&mut cluster);

        let status = cluster.status.as_ref().unwrap();
        assert!(!status.ready);
        assert!(conditions::is_false(&status.conditions, conditions::CONTROL_PLANE_ENDPOINT_SET));
        assert!(cluster.spec.control_plane_endpoint.is_none());
    }

    #[test]
    fn test_endpoint_keeps_user_host() {
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_endpoint = Some(ApiEndpoint {
            host: "api.demo.test".to_string(),
            port: 0,
        });
        cluster.status_mut().control_plane_load_balancer = Some(LoadBalancerStatus {
            id: 1,
            ipv4: Some("198.51.100.7".to_string()),
            ..Default::default()
        });

        process_control_plane_endpoint(&mut cluster);

        let endpoint = cluster.spec.control_plane_endpoint.clone().unwrap();
        assert_eq!(endpoint.host, "api.demo.test");
        assert_eq!(endpoint.port, 6443);
        assert!(cluster.status.as_ref().unwrap().ready);
    }

    #[test]
    fn test_endpoint_without_load_balancer_needs_user_value() {
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.enabled = false;

        process_control_plane_endpoint(&mut cluster);
        assert!(!cluster.status.as_ref().unwrap().ready);

        cluster.spec.control_plane_endpoint = Some(ApiEndpoint {
            host: "10.1.0.10".to_string(),
            port: 6443,
        });
        process_control_plane_endpoint(&mut cluster);
        let status = cluster.status.as_ref().unwrap();
        assert!(status.ready);
        assert!(conditions::is_true(&status.conditions, conditions::CONTROL_PLANE_ENDPOINT_SET));
    }

    #[test]
    fn test_token_from_secret() {
        let secret = secret_with("hcloud", " token-value\n");
        assert_eq!(token_from_secret(Some(&secret), "hcloud"), Ok("token-value".to_string()));
        assert_eq!(token_from_secret(Some(&secret), "other"), Err(TokenProblem::TokenEmpty));
        assert_eq!(
            token_from_secret(Some(&secret_with("hcloud", "  ")), "hcloud"),
            Err(TokenProblem::TokenEmpty)
        );
        assert_eq!(token_from_secret(None, "hcloud"), Err(TokenProblem::SecretMissing));
    }

    #[test]
    fn test_token_problems_map_to_reasons() {
        let mut cluster = create_test_cluster("demo", "default");

        mark_token_unavailable(&mut cluster, &TokenProblem::SecretMissing);
        let condition = conditions::get(
            &cluster.status.as_ref().unwrap().conditions,
            conditions::HCLOUD_TOKEN_AVAILABLE,
        )
        .cloned()
        .unwrap();
        assert_eq!(condition.reason.as_deref(), Some(conditions::HETZNER_SECRET_UNREACHABLE_REASON));

        mark_token_unavailable(&mut cluster, &TokenProblem::TokenEmpty);
        let status = cluster.status.as_ref().unwrap();
        let condition = conditions::get(&status.conditions, conditions::HCLOUD_TOKEN_AVAILABLE).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(conditions::HCLOUD_CREDENTIALS_INVALID_REASON));
        assert!(conditions::is_false(&status.conditions, READY));
    }
}
