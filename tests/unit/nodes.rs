//! Unit tests for node readiness and DaemonSet placement

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus};
use k8s_openapi::api::core::v1::{
    Node, NodeCondition, NodeSpec, NodeStatus, Pod, PodCondition, PodSpec, PodStatus, Taint,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::ObjectMeta;
use kube_conformance::framework::nodes::{
    check_daemon_status, daemon_pods_on_no_nodes, daemon_pods_on_nodes, daemon_pods_per_node,
    daemonset_label_removal, is_node_ready, is_node_schedulable, is_pod_running_and_ready, schedulable_node_names,
};
use serde_json::json;

const DS_UID: &str = "ds-uid";

fn node(name: &str, ready: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

fn tainted(name: &str, effect: &str) -> Node {
    tainted_with(name, "node-role.kubernetes.io/control-plane", effect)
}

fn tainted_with(name: &str, key: &str, effect: &str) -> Node {
    let mut n = node(name, true);
    n.spec = Some(NodeSpec {
        taints: Some(vec![Taint {
            key: key.to_string(),
            effect: effect.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    });
    n
}

fn daemon_pod(name: &str, node: &str, owner_uid: &str, ready: bool) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".to_string(),
                kind: "DaemonSet".to_string(),
                name: "ds".to_string(),
                uid: owner_uid.to_string(),
                controller: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

mod node_tests {
    use super::*;

    #[test]
    fn test_ready_condition() {
        assert!(is_node_ready(&node("a", true)));
        assert!(!is_node_ready(&node("a", false)));
        assert!(!is_node_ready(&Node::default()));
    }

    #[test]
    fn test_cordoned_node_still_runs_daemon_pods() {
        let mut n = tainted_with("a", "node.kubernetes.io/unschedulable", "NoSchedule");
        if let Some(spec) = n.spec.as_mut() {
            spec.unschedulable = Some(true);
        }
        assert!(is_node_schedulable(&n));
    }

    #[test]
    fn test_daemon_tolerated_taints() {
        for key in [
            "node.kubernetes.io/disk-pressure",
            "node.kubernetes.io/memory-pressure",
            "node.kubernetes.io/pid-pressure",
        ] {
            assert!(is_node_schedulable(&tainted_with("a", key, "NoSchedule")), "{key}");
        }
        assert!(is_node_schedulable(&tainted_with(
            "a",
            "node.kubernetes.io/unreachable",
            "NoExecute"
        )));
        // Tolerated only with the effect the controller adds
        assert!(!is_node_schedulable(&tainted_with(
            "a",
            "node.kubernetes.io/disk-pressure",
            "NoExecute"
        )));
    }

    #[test]
    fn test_repelling_taints() {
        assert!(!is_node_schedulable(&tainted("a", "NoSchedule")));
        assert!(!is_node_schedulable(&tainted("a", "NoExecute")));
        assert!(is_node_schedulable(&tainted("a", "PreferNoSchedule")));
    }

    #[test]
    fn test_schedulable_node_names() {
        let nodes = vec![
            node("worker-1", true),
            node("worker-2", false),
            tainted("control-plane", "NoSchedule"),
            node("worker-3", true),
            tainted_with("cordoned", "node.kubernetes.io/unschedulable", "NoSchedule"),
        ];
        assert_eq!(
            schedulable_node_names(&nodes),
            names(&["cordoned", "worker-1", "worker-3"])
        );
    }

    #[test]
    fn test_label_removal_nulls_daemonset_labels_only() {
        let mut n = node("a", true);
        n.metadata.labels = Some(BTreeMap::from([
            ("daemonset-color".to_string(), "blue".to_string()),
            ("kubernetes.io/hostname".to_string(), "a".to_string()),
        ]));
        assert_eq!(
            daemonset_label_removal(&n),
            Some(json!({ "metadata": { "labels": { "daemonset-color": null } } }))
        );
        assert_eq!(daemonset_label_removal(&node("b", true)), None);
    }
}

mod placement_tests {
    use super::*;

    #[test]
    fn test_pod_readiness() {
        assert!(is_pod_running_and_ready(&daemon_pod("p", "n", DS_UID, true)));
        assert!(!is_pod_running_and_ready(&daemon_pod("p", "n", DS_UID, false)));

        let mut pending = daemon_pod("p", "n", DS_UID, true);
        if let Some(status) = pending.status.as_mut() {
            status.phase = Some("Pending".to_string());
        }
        assert!(!is_pod_running_and_ready(&pending));
    }

    #[test]
    fn test_counts_only_owned_ready_live_pods() {
        let mut terminating = daemon_pod("p4", "n1", DS_UID, true);
        terminating.metadata.deletion_timestamp =
            Some(serde_json::from_value(json!("2024-01-01T00:00:00Z")).unwrap());

        let pods = vec![
            daemon_pod("p1", "n1", DS_UID, true),
            daemon_pod("p2", "n2", DS_UID, false),
            daemon_pod("p3", "n2", "other-uid", true),
            terminating,
        ];
        let counts = daemon_pods_per_node(&pods, DS_UID);
        assert_eq!(counts, BTreeMap::from([("n1".to_string(), 1)]));
    }

    #[test]
    fn test_one_pod_per_node() {
        let pods = vec![
            daemon_pod("p1", "n1", DS_UID, true),
            daemon_pod("p2", "n2", DS_UID, true),
        ];
        assert!(daemon_pods_on_nodes(&pods, DS_UID, &names(&["n1", "n2"])));
        assert!(!daemon_pods_on_nodes(&pods, DS_UID, &names(&["n1", "n2", "n3"])));
    }

    #[test]
    fn test_cordoned_node_is_expected_to_run_a_daemon_pod() {
        let mut cordoned = tainted_with("cordoned", "node.kubernetes.io/unschedulable", "NoSchedule");
        if let Some(spec) = cordoned.spec.as_mut() {
            spec.unschedulable = Some(true);
        }
        let expected = schedulable_node_names(&[node("worker", true), cordoned]);
        let pods = vec![
            daemon_pod("p1", "worker", DS_UID, true),
            daemon_pod("p2", "cordoned", DS_UID, true),
        ];
        assert!(daemon_pods_on_nodes(&pods, DS_UID, &expected));
    }

    #[test]
    fn test_extra_pods_fail_placement() {
        let pods = vec![
            daemon_pod("p1", "n1", DS_UID, true),
            daemon_pod("p2", "n1", DS_UID, true),
        ];
        assert!(!daemon_pods_on_nodes(&pods, DS_UID, &names(&["n1"])));

        let stray = vec![
            daemon_pod("p1", "n1", DS_UID, true),
            daemon_pod("p2", "tainted", DS_UID, true),
        ];
        assert!(!daemon_pods_on_nodes(&stray, DS_UID, &names(&["n1"])));
    }

    #[test]
    fn test_no_daemon_pods_counts_pods_in_any_state() {
        let pods = vec![
            daemon_pod("p1", "n1", DS_UID, false),
            daemon_pod("p2", "n2", "other-uid", true),
        ];
        assert!(!daemon_pods_on_no_nodes(&pods, DS_UID));
        assert!(daemon_pods_on_no_nodes(&pods, "gone-uid"));
        assert!(daemon_pods_on_no_nodes(&[], DS_UID));
    }

    fn daemon_set(desired: i32, scheduled: i32, ready: i32) -> DaemonSet {
        DaemonSet {
            metadata: ObjectMeta {
                name: Some("ds".to_string()),
                ..Default::default()
            },
            status: Some(DaemonSetStatus {
                desired_number_scheduled: desired,
                current_number_scheduled: scheduled,
                number_ready: ready,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_daemon_status() {
        check_daemon_status(&daemon_set(3, 3, 3)).unwrap();
        check_daemon_status(&daemon_set(3, 3, 1)).unwrap();
        check_daemon_status(&daemon_set(3, 2, 3)).unwrap();
        assert!(check_daemon_status(&daemon_set(3, 2, 2)).is_err());
        assert!(check_daemon_status(&DaemonSet::default()).is_err());
    }
}
