//! Unit tests for the load balancer service

#[cfg(test)]
mod tests {
    use super::super::LoadBalancerService;
    use crate::test_utils::*;
    use crds::conditions::{
        self, LOAD_BALANCER_ATTACHED, LOAD_BALANCER_ATTACHED_TO_NETWORK,
        LOAD_BALANCER_ATTACH_FAILED_REASON, LOAD_BALANCER_NO_NETWORK_FOUND_REASON,
    };
    use crds::{LoadBalancerServiceSpec, LoadBalancerStatus, NetworkStatus};
    use hcloud_client::{
        ErrorCode, Labels, LoadBalancer, LoadBalancerAlgorithm, LoadBalancerAlgorithmType,
        LoadBalancerPublicNet, LoadBalancerService as RemoteService, LoadBalancerServiceProtocol,
        LoadBalancerType, MockHCloudClient, Network, Protection, PublicIp,
    };

    fn remote_lb(id: u64, labels: Labels, ports: &[u16]) -> LoadBalancer {
        LoadBalancer {
            id,
            name: "demo-kube-apiserver-abcde".to_string(),
            public_net: LoadBalancerPublicNet {
                enabled: true,
                ipv4: PublicIp {
                    ip: Some("198.51.100.7".to_string()),
                },
                ipv6: PublicIp::default(),
            },
            private_net: Vec::new(),
            location: Default::default(),
            load_balancer_type: LoadBalancerType {
                name: "lb11".to_string(),
            },
            algorithm: LoadBalancerAlgorithm {
                algorithm_type: LoadBalancerAlgorithmType::RoundRobin,
            },
            services: ports
                .iter()
                .map(|port| RemoteService {
                    protocol: LoadBalancerServiceProtocol::Tcp,
                    listen_port: *port,
                    destination_port: *port,
                    proxyprotocol: false,
                })
                .collect(),
            targets: Vec::new(),
            protection: Protection::default(),
            labels,
        }
    }

    fn extra_service(port: u16) -> LoadBalancerServiceSpec {
        LoadBalancerServiceSpec {
            protocol: crds::LoadBalancerServiceProtocol::Tcp,
            listen_port: port,
            destination_port: port,
        }
    }

    fn remote_network(id: u64) -> Network {
        Network {
            id,
            name: "demo".to_string(),
            ip_range: "10.0.0.0/16".parse().unwrap(),
            subnets: Vec::new(),
            servers: Vec::new(),
            load_balancers: Vec::new(),
            labels: owned_labels("demo"),
            protection: Protection::default(),
        }
    }

    fn lb_ports(mock: &MockHCloudClient) -> Vec<u16> {
        let mut ports: Vec<u16> = mock.load_balancers()[0]
            .services
            .iter()
            .map(|svc| svc.listen_port)
            .collect();
        ports.sort_unstable();
        ports
    }

    #[tokio::test]
    async fn test_disabled_load_balancer_is_skipped() {
        let mock = MockHCloudClient::new();
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.enabled = false;
        let mut scope = create_test_scope(cluster, &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_creates_load_balancer_with_api_server_service() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let lbs = mock.load_balancers();
        assert_eq!(lbs.len(), 1);
        let lb = &lbs[0];
        assert!(lb.name.starts_with("demo-kube-apiserver-"));
        assert_eq!(lb.load_balancer_type.name, "lb11");
        assert_eq!(lb.location.name, "fsn1");
        assert_eq!(lb.labels, owned_labels("demo"));
        assert_eq!(lb.services.len(), 1);
        assert_eq!(lb.services[0].listen_port, 6443);
        assert_eq!(lb.services[0].destination_port, 6443);

        let status = scope
            .status()
            .and_then(|s| s.control_plane_load_balancer.clone())
            .unwrap();
        assert_eq!(status.id, lb.id);
        assert!(status.ipv4.is_some());
        assert_eq!(status.internal_ip, None);
        assert!(conditions::is_true(scope.conditions(), LOAD_BALANCER_ATTACHED));
        assert!(scope.events().iter().any(|e| e.reason == "CreateLoadBalancer"));
    }

    #[tokio::test]
    async fn test_listen_port_follows_control_plane_endpoint() {
        let mock = MockHCloudClient::new();
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_endpoint = Some(crds::ApiEndpoint {
            host: "api.demo.test".to_string(),
            port: 443,
        });
        cluster.spec.control_plane_load_balancer.port = 6444;
        let mut scope = create_test_scope(cluster, &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let lb = &mock.load_balancers()[0];
        assert_eq!(lb.services[0].listen_port, 443);
        assert_eq!(lb.services[0].destination_port, 6444);
    }

    #[tokio::test]
    async fn test_second_reconcile_is_idempotent() {
        let mock = MockHCloudClient::new();
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.extra_services = vec![extra_service(8080)];
        let mut scope = create_test_scope(cluster, &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();
        mock.clear_calls();
        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        assert!(mock.mutating_calls().is_empty(), "calls: {:?}", mock.mutating_calls());
    }

    #[tokio::test]
    async fn test_services_are_diffed_by_listen_port() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443, 9090, 7000]));
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.extra_services =
            vec![extra_service(8080), extra_service(9090)];
        let mut scope = create_test_scope(cluster, &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        assert_eq!(mock.call_count("add_service_to_load_balancer"), 1);
        assert_eq!(mock.call_count("delete_service_from_load_balancer"), 1);
        assert_eq!(lb_ports(&mock), vec![6443, 8080, 9090]);
        assert!(scope.events().iter().any(|e| e.reason == "AddedServiceToLoadBalancer"));
        assert!(scope.events().iter().any(|e| e.reason == "DeletedServiceFromLoadBalancer"));
    }

    #[tokio::test]
    async fn test_rate_limit_stops_remaining_service_operations() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443, 7000]));
        mock.fail_next("delete_service_from_load_balancer", ErrorCode::RateLimitExceeded);
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.extra_services =
            vec![extra_service(8080), extra_service(8081)];
        let mut scope = create_test_scope(cluster, &mock);

        let err = LoadBalancerService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.is_rate_limit());
        assert_eq!(mock.call_count("add_service_to_load_balancer"), 0);
        assert!(conditions::is_false(scope.conditions(), conditions::HETZNER_API_REACHABLE));
    }

    #[tokio::test]
    async fn test_service_errors_are_aggregated() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        mock.fail_next("add_service_to_load_balancer", ErrorCode::Conflict);
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.extra_services =
            vec![extra_service(8080), extra_service(8081)];
        let mut scope = create_test_scope(cluster, &mock);

        let err = LoadBalancerService::new(&mut scope).reconcile().await.unwrap_err();

        // The second add still ran
        assert_eq!(mock.call_count("add_service_to_load_balancer"), 2);
        assert!(err.to_string().contains("aggregate error - updating load balancer services"));
        assert_eq!(lb_ports(&mock), vec![6443, 8081]);
    }

    #[tokio::test]
    async fn test_properties_are_updated() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.load_balancer_type = "lb21".to_string();
        cluster.spec.control_plane_load_balancer.algorithm = crds::LoadBalancerAlgorithm::LeastConnections;
        cluster.spec.control_plane_load_balancer.name = Some("demo-api".to_string());
        let mut scope = create_test_scope(cluster, &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let lb = &mock.load_balancers()[0];
        assert_eq!(lb.load_balancer_type.name, "lb21");
        assert_eq!(lb.algorithm.algorithm_type, LoadBalancerAlgorithmType::LeastConnections);
        assert_eq!(lb.name, "demo-api");
        for reason in ["ChangeLoadBalancerType", "ChangeLoadBalancerAlgorithm", "ChangeLoadBalancerName"] {
            assert!(scope.events().iter().any(|e| e.reason == reason), "missing {reason}");
        }
    }

    #[tokio::test]
    async fn test_property_failure_does_not_block_others() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        mock.fail_next("change_load_balancer_type", ErrorCode::Conflict);
        let mut cluster = create_test_cluster("demo", "default");
        cluster.spec.control_plane_load_balancer.load_balancer_type = "lb21".to_string();
        cluster.spec.control_plane_load_balancer.algorithm = crds::LoadBalancerAlgorithm::LeastConnections;
        let mut scope = create_test_scope(cluster, &mock);

        assert!(LoadBalancerService::new(&mut scope).reconcile().await.is_err());

        assert_eq!(mock.call_count("change_load_balancer_algorithm"), 1);
        assert!(conditions::is_false(scope.conditions(), LOAD_BALANCER_ATTACHED));
    }

    #[tokio::test]
    async fn test_no_network_marks_condition_without_failing() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let condition = conditions::get(scope.conditions(), LOAD_BALANCER_ATTACHED_TO_NETWORK).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(LOAD_BALANCER_NO_NETWORK_FOUND_REASON));
        assert_eq!(mock.call_count("attach_load_balancer_to_network"), 0);
    }

    #[tokio::test]
    async fn test_attaches_existing_load_balancer_to_network() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(10));
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(NetworkStatus {
            id: 10,
            ..Default::default()
        });

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        assert_eq!(mock.call_count("attach_load_balancer_to_network"), 1);
        assert!(conditions::is_true(scope.conditions(), LOAD_BALANCER_ATTACHED_TO_NETWORK));
        assert!(mock.load_balancers()[0].private_net.iter().any(|net| net.network == 10));
    }

    #[tokio::test]
    async fn test_already_attached_counts_as_success() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(10));
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        mock.fail_next("attach_load_balancer_to_network", ErrorCode::LoadBalancerAlreadyAttached);
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(NetworkStatus {
            id: 10,
            ..Default::default()
        });

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        assert!(conditions::is_true(scope.conditions(), LOAD_BALANCER_ATTACHED_TO_NETWORK));
    }

    #[tokio::test]
    async fn test_attach_failure_marks_condition_and_records_event() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(10));
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        mock.fail_next("attach_load_balancer_to_network", ErrorCode::Conflict);
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(NetworkStatus {
            id: 10,
            ..Default::default()
        });

        assert!(LoadBalancerService::new(&mut scope).reconcile().await.is_err());

        let condition = conditions::get(scope.conditions(), LOAD_BALANCER_ATTACHED_TO_NETWORK).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(LOAD_BALANCER_ATTACH_FAILED_REASON));
        assert!(scope.events().iter().any(|e| e.reason == "FailedAttachLoadBalancer"));
    }

    #[tokio::test]
    async fn test_new_load_balancer_joins_network_and_reports_internal_ip() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(10));
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(NetworkStatus {
            id: 10,
            ..Default::default()
        });

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let status = scope
            .status()
            .and_then(|s| s.control_plane_load_balancer.clone())
            .unwrap();
        assert!(status.attached_to_network);
        assert!(status.internal_ip.is_some());
        assert_eq!(mock.call_count("attach_load_balancer_to_network"), 0);
    }

    #[tokio::test]
    async fn test_unlabeled_load_balancer_is_left_alone() {
        let mock = MockHCloudClient::new();
        let mut foreign = remote_lb(1, Labels::new(), &[6443, 7000]);
        foreign.name = "foreign".to_string();
        mock.add_load_balancer(foreign);
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);

        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        let lbs = mock.load_balancers();
        assert_eq!(lbs.len(), 2);
        assert_eq!(lbs[0].services.len(), 2, "foreign load balancer must be untouched");
    }

    #[tokio::test]
    async fn test_multiple_owned_load_balancers_is_an_error() {
        let mock = MockHCloudClient::new();
        mock.add_load_balancer(remote_lb(1, owned_labels("demo"), &[6443]));
        let mut second = remote_lb(2, owned_labels("demo"), &[6443]);
        second.name = "second".to_string();
        mock.add_load_balancer(second);
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);

        let err = LoadBalancerService::new(&mut scope).reconcile().await.unwrap_err();

        assert!(err.to_string().contains("multiple load balancers"));
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_protected_load_balancer() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);
        scope.status_mut().control_plane_load_balancer = Some(LoadBalancerStatus {
            id: 1,
            protected: true,
            ..Default::default()
        });

        LoadBalancerService::new(&mut scope).delete().await.unwrap();

        assert_eq!(mock.call_count("delete_load_balancer"), 0);
        assert!(scope.events().iter().any(|e| e.reason == "LoadBalancerProtectedFromDeletion"));
    }

    #[tokio::test]
    async fn test_delete_removes_load_balancer() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);
        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();

        LoadBalancerService::new(&mut scope).delete().await.unwrap();

        assert!(mock.load_balancers().is_empty());
        assert!(scope.status().and_then(|s| s.control_plane_load_balancer.as_ref()).is_none());
        assert!(scope.events().iter().any(|e| e.reason == "DeleteLoadBalancer"));
    }

    #[tokio::test]
    async fn test_delete_swallows_not_found() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);
        scope.status_mut().control_plane_load_balancer = Some(LoadBalancerStatus {
            id: 404,
            ..Default::default()
        });

        LoadBalancerService::new(&mut scope).delete().await.unwrap();

        assert!(scope.status().and_then(|s| s.control_plane_load_balancer.as_ref()).is_none());
    }

    #[tokio::test]
    async fn test_properties_are_patched_even_when_attach_fails() {
        let mock = MockHCloudClient::new();
        mock.add_network(remote_network(10));
        let mut stale = remote_lb(1, owned_labels("demo"), &[6443]);
        stale.load_balancer_type.name = "lb21".to_string();
        mock.add_load_balancer(stale);
        mock.fail_next("attach_load_balancer_to_network", ErrorCode::Conflict);
        let mut scope = create_test_scope(create_test_cluster_with_network("demo", "default"), &mock);
        scope.status_mut().network = Some(NetworkStatus {
            id: 10,
            ..Default::default()
        });

        assert!(LoadBalancerService::new(&mut scope).reconcile().await.is_err());

        assert_eq!(mock.call_count("change_load_balancer_type"), 1);
        assert_eq!(mock.load_balancers()[0].load_balancer_type.name, "lb11");
    }

    #[tokio::test]
    async fn test_delete_failure_records_event_and_keeps_status() {
        let mock = MockHCloudClient::new();
        let mut scope = create_test_scope(create_test_cluster("demo", "default"), &mock);
        LoadBalancerService::new(&mut scope).reconcile().await.unwrap();
        mock.fail_next("delete_load_balancer", ErrorCode::Locked);

        assert!(LoadBalancerService::new(&mut scope).delete().await.is_err());

        assert!(scope.events().iter().any(|e| e.reason == "FailedLoadBalancerDelete"));
        assert!(scope.status().and_then(|s| s.control_plane_load_balancer.as_ref()).is_some());
        assert_eq!(mock.load_balancers().len(), 1);
    }
}
