//! Node and DaemonSet placement helpers

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Taint};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{Map, Value, json};

use crate::{Error, Result};

/// Node labels with this prefix are owned by DaemonSet tests and cleared between runs
pub const DAEMONSET_LABEL_PREFIX: &str = "daemonset-";

/// Namespace annotation restricting which nodes its pods may land on
pub const NODE_SELECTOR_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/node-selector";

fn has_true_condition<'a>(
    mut conditions: impl Iterator<Item = (&'a str, &'a str)>,
    type_: &str,
) -> bool {
    conditions.any(|(t, s)| t == type_ && s == "True")
}

pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            has_true_condition(
                conds.iter().map(|c| (c.type_.as_str(), c.status.as_str())),
                "Ready",
            )
        })
        .unwrap_or(false)
}

/// Taints every DaemonSet pod tolerates, added by the DaemonSet controller
///
/// Cordoning a node taints it with `node.kubernetes.io/unschedulable`, so
/// cordoned nodes still run daemon pods.
pub const DAEMON_TOLERATED_TAINTS: [(&str, &str); 6] = [
    ("node.kubernetes.io/not-ready", "NoExecute"),
    ("node.kubernetes.io/unreachable", "NoExecute"),
    ("node.kubernetes.io/disk-pressure", "NoSchedule"),
    ("node.kubernetes.io/memory-pressure", "NoSchedule"),
    ("node.kubernetes.io/pid-pressure", "NoSchedule"),
    ("node.kubernetes.io/unschedulable", "NoSchedule"),
];

fn repels_daemon_pods(taint: &Taint) -> bool {
    (taint.effect == "NoSchedule" || taint.effect == "NoExecute")
        && !DAEMON_TOLERATED_TAINTS
            .iter()
            .any(|(key, effect)| taint.key == *key && taint.effect == *effect)
}

/// Ready, and free of taints a DaemonSet pod without extra tolerations would not tolerate
///
/// `spec.unschedulable` is ignored: the DaemonSet controller places pods on
/// cordoned nodes.
pub fn is_node_schedulable(node: &Node) -> bool {
    let repelled = node
        .spec
        .iter()
        .flat_map(|spec| spec.taints.iter().flatten())
        .any(repels_daemon_pods);
    !repelled && is_node_ready(node)
}

/// Names of ready nodes a DaemonSet without tolerations is expected to cover
pub fn schedulable_node_names(nodes: &[Node]) -> BTreeSet<String> {
    nodes
        .iter()
        .filter(|n| is_node_schedulable(n))
        .map(|n| n.name_any())
        .collect()
}

pub fn is_pod_running_and_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    status.phase.as_deref() == Some("Running")
        && status
            .conditions
            .as_ref()
            .map(|conds| {
                has_true_condition(
                    conds.iter().map(|c| (c.type_.as_str(), c.status.as_str())),
                    "Ready",
                )
            })
            .unwrap_or(false)
}

fn is_owned_by(pod: &Pod, owner_uid: &str) -> bool {
    pod.owner_references().iter().any(|r| r.uid == owner_uid)
}

/// Count of running-and-ready pods owned by `owner_uid`, per node
///
/// Pods already marked for deletion are ignored.
pub fn daemon_pods_per_node(pods: &[Pod], owner_uid: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for pod in pods {
        if pod.metadata.deletion_timestamp.is_some() || !is_owned_by(pod, owner_uid) {
            continue;
        }
        if !is_pod_running_and_ready(pod) {
            continue;
        }
        if let Some(node) = pod.spec.as_ref().and_then(|s| s.node_name.clone()) {
            *counts.entry(node).or_insert(0) += 1;
        }
    }
    counts
}

/// Exactly one daemon pod on each of `nodes`, and none anywhere else
pub fn daemon_pods_on_nodes(pods: &[Pod], owner_uid: &str, nodes: &BTreeSet<String>) -> bool {
    let counts = daemon_pods_per_node(pods, owner_uid);
    for node in nodes {
        let count = counts.get(node).copied().unwrap_or(0);
        if count != 1 {
            tracing::debug!("Node {} is running {} daemon pod(s), expected 1", node, count);
            return false;
        }
    }
    counts.len() == nodes.len()
}

/// No pod owned by `owner_uid` is left, in any phase
pub fn daemon_pods_on_no_nodes(pods: &[Pod], owner_uid: &str) -> bool {
    !pods.iter().any(|p| is_owned_by(p, owner_uid))
}

/// Fail unless the DaemonSet's status shows its pods scheduled or ready everywhere it wants them
pub fn check_daemon_status(ds: &DaemonSet) -> Result<()> {
    let name = ds.name_any();
    let status = ds
        .status
        .as_ref()
        .ok_or_else(|| Error::assertion(format!("DaemonSet {name} has no status")))?;

    let desired = status.desired_number_scheduled;
    let scheduled = status.current_number_scheduled;
    let ready = status.number_ready;
    if desired != scheduled && desired != ready {
        return Err(Error::assertion(format!(
            "DaemonSet {name}: desired {desired}, scheduled {scheduled}, ready {ready}"
        )));
    }
    Ok(())
}

/// Schedulable node names currently in the cluster
pub async fn list_schedulable_node_names(client: Client) -> Result<BTreeSet<String>> {
    let nodes: Api<Node> = Api::all(client);
    let list = nodes.list(&ListParams::default()).await?;
    Ok(schedulable_node_names(&list.items))
}

/// Merge patch removing every `daemonset-` label from `node`, `None` if there is nothing to remove
pub fn daemonset_label_removal(node: &Node) -> Option<Value> {
    let removals: Map<String, Value> = node
        .labels()
        .keys()
        .filter(|k| k.starts_with(DAEMONSET_LABEL_PREFIX))
        .map(|k| (k.clone(), Value::Null))
        .collect();
    if removals.is_empty() {
        None
    } else {
        Some(json!({ "metadata": { "labels": removals } }))
    }
}

/// Remove `daemonset-` prefixed labels left on nodes by earlier runs
pub async fn clear_daemonset_node_labels(client: Client) -> Result<()> {
    let nodes: Api<Node> = Api::all(client);
    for node in nodes.list(&ListParams::default()).await?.items {
        if let Some(patch) = daemonset_label_removal(&node) {
            let name = node.name_any();
            tracing::debug!("Clearing DaemonSet labels from node {}", name);
            nodes
                .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }
    }
    Ok(())
}

/// Clear any namespace-level node selector so daemon pods may land on every node
pub async fn patch_namespace_node_selector(client: Client, namespace: &str) -> Result<Namespace> {
    let namespaces: Api<Namespace> = Api::all(client);
    let patch = json!({ "metadata": { "annotations": { NODE_SELECTOR_ANNOTATION: "" } } });
    Ok(namespaces
        .patch(namespace, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}
