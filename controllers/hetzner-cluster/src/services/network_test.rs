//! Unit tests for the network service

#[cfg(test)]
mod tests {
    use super::super::NetworkService;
    use crate::test_utils::*;
    use crds::conditions::{self, ConditionSeverity, NETWORK_ATTACHED, NETWORK_DISABLED_REASON};
    use hcloud_client::{ErrorCode, Labels, MockHCloudClient, Network, NetworkSubnet, NetworkSubnetType};

    fn remote_network(id: u64, name: &str, labels: Labels, subnets: usize) -> Network {
        Network {
            id,
            name: name.to_string(),
            ip_range: "10.0.0.0/16".parse().unwrap(),
            subnets: (0..subnets)
                .map(|i| NetworkSubnet {
                    subnet_type: NetworkSubnetType::Cloud,
                    ip_range: format!("10.0.{i}.0/24").parse().unwrap(),
                    network_zone: "eu-central".to_string(),
                    gateway: None,
                })
                .collect(),
            servers: vec![42],
            load_balancers: Vec::new(),
            labels,
            protection: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_disabled_network_is_skipped() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);

        NetworkService::new(&mut scope).reconcile().await.unwrap();

        assert!(mock.calls().is_empty());
        let condition = conditions::get(scope.conditions(), NETWORK_ATTACHED).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(NETWORK_DISABLED_REASON));
        assert_eq!(condition.severity, Some(ConditionSeverity::Info));
    }

    #[tokio::test]
    async fn test_creates_network_with_parsed_cidrs_and_owned_label() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        NetworkService::new(&mut scope).reconcile().await.unwrap();

        let networks = mock.networks();
        assert_eq!(networks.len(), 1);
        let network = &networks[0];
        assert_eq!(network.name, "demo");
        assert_eq!(network.ip_range, "10.0.0.0/16".parse().unwrap());
        assert_eq!(network.subnets.len(), 1);
        assert_eq!(network.subnets[0].ip_range, "10.0.0.0/24".parse().unwrap());
        assert_eq!(network.subnets[0].network_zone, "eu-central");
        assert_eq!(network.labels.get("caph-cluster-demo").map(String::as_str), Some("owned"));

        let status = scope.status().and_then(|s| s.network.clone()).unwrap();
        assert_eq!(status.id, network.id);
        assert!(conditions::is_true(scope.conditions(), NETWORK_ATTACHED));
        assert!(scope.events().iter().any(|e| e.reason == "NetworkCreated"));
    }

    #[tokio::test]
    async fn test_second_reconcile_is_idempotent() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        NetworkService::new(&mut scope).reconcile().await.unwrap();
        mock.clear_calls();
        NetworkService::new(&mut scope).reconcile().await.unwrap();

        assert!(mock.mutating_calls().is_empty());
        assert_eq!(mock.networks().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_cidr_fails_before_any_create() {
        let mock = MockHCloudClient::new();
        let mut cluster = create_test_cluster_with_network("demo", "default");
        cluster.spec.hcloud_network.cidr_block = "10.0.0.0/99".to_string();
        let mut scope = create_test_scope(cluster, &mock);

        let err = NetworkService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.to_string().contains("spec.hcloudNetwork.cidrBlock"));
        assert_eq!(mock.call_count("create_network"), 0);
        assert!(conditions::is_false(scope.conditions(), NETWORK_ATTACHED));
    }

    #[tokio::test]
    async fn test_invalid_subnet_cidr_names_subnet_field() {
        let mock = MockHCloudClient::new();
        let mut cluster = create_test_cluster_with_network("demo", "default");
        cluster.spec.hcloud_network.subnet_cidr_block = "garbage".to_string();
        let mut scope = create_test_scope(cluster, &mock);

        let err = NetworkService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.to_string().contains("spec.hcloudNetwork.subnetCidrBlock"));
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_owned_networks_is_an_error() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(1, "demo-a", owned_labels("demo"), 1));
        mock.add_network(remote_network(2, "demo-b", owned_labels("demo"), 1));
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        let err = NetworkService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.to_string().contains("multiple networks"));
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_subnets_is_an_error() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(7, "demo", owned_labels("demo"), 2));
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        let err = NetworkService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.to_string().contains("multiple subnets not allowed"));
        assert!(scope.status().and_then(|s| s.network.as_ref()).is_none());
    }

    #[tokio::test]
    async fn test_unlabeled_network_is_ignored() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(3, "someone-else", Labels::new(), 1));
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        NetworkService::new(&mut scope).reconcile().await.unwrap();

        // A new one is created, the foreign one stays untouched
        assert_eq!(mock.networks().len(), 2);
        assert_ne!(scope.status().and_then(|s| s.network.as_ref()).map(|n| n.id), Some(3));
    }

    #[tokio::test]
    async fn test_network_by_id_is_used() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(11, "shared", Labels::new(), 1));
        let mut cluster = create_test_cluster_with_network("demo", "default");
        cluster.spec.hcloud_network.id = Some(11);
        let mut scope = create_test_scope(cluster, &mock);

        NetworkService::new(&mut scope).reconcile().await.unwrap();

        let status = scope.status().and_then(|s| s.network.clone()).unwrap();
        assert_eq!(status.id, 11);
        assert_eq!(status.attached_servers, vec![42]);
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_marks_api_unreachable() {
        let mock = MockHCloudClient::new();
        mock.fail_next("list_networks", ErrorCode::RateLimitExceeded);
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);

        let err = NetworkService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.is_rate_limit());
        let condition = conditions::get(scope.conditions(), conditions::HETZNER_API_REACHABLE).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(conditions::RATE_LIMIT_EXCEEDED_REASON));
        assert!(scope.events().iter().any(|e| e.reason == "RateLimitExceeded"));
    }

    #[tokio::test]
    async fn test_delete_removes_network_and_clears_status() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        NetworkService::new(&mut scope).reconcile().await.unwrap();

        NetworkService::new(&mut scope).delete().await.unwrap();

        assert!(mock.networks().is_empty());
        assert!(scope.status().and_then(|s| s.network.as_ref()).is_none());
        assert!(scope.events().iter().any(|e| e.reason == "NetworkDeleted"));
    }

    #[tokio::test]
    async fn test_delete_swallows_not_found() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(crds::NetworkStatus {
            id: 999,
            labels: owned_labels("demo"),
            ..Default::default()
        });

        NetworkService::new(&mut scope).delete().await.unwrap();

        assert_eq!(mock.call_count("delete_network"), 1);
        assert!(scope.status().and_then(|s| s.network.as_ref()).is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_records_event() {
        let mock = MockHCloudClient::new();
        mock.fail_next("delete_network", ErrorCode::Locked);
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(crds::NetworkStatus {
            id: 5,
            labels: owned_labels("demo"),
            ..Default::default()
        });

        assert!(NetworkService::new(&mut scope).delete().await.is_err());
        assert!(scope.events().iter().any(|e| e.reason == "NetworkDeleteFailed"));
        assert!(scope.status().and_then(|s| s.network.as_ref()).is_some());
    }

    #[tokio::test]
    async fn test_delete_keeps_adopted_unlabeled_network() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(11, "shared", Labels::new(), 1));
        let mut cluster = create_test_cluster_with_network("demo", "default");
        cluster.spec.hcloud_network.id = Some(11);
        let mut scope = create_test_scope(cluster, &mock);
        NetworkService::new(&mut scope).reconcile().await.unwrap();

        NetworkService::new(&mut scope).delete().await.unwrap();

        assert_eq!(mock.call_count("delete_network"), 0);
        assert_eq!(mock.networks().len(), 1);
        assert!(scope.status().and_then(|s| s.network.as_ref()).is_none());
    }
}
