//! ControllerRevision lifecycle, driven through a DaemonSet
//!
//! The DaemonSet controller owns the revisions in this scenario, so the test
//! has to coexist with it: revisions it creates by hand carry a controller
//! owner reference to the DaemonSet, and counts are polled rather than read
//! once because the controller may still be reconciling.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{ControllerRevision, DaemonSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::fixtures::{controller_revision_for, daemon_set_with_label};
use crate::framework::hash::{compute_hash, rand_string};
use crate::framework::nodes::{
    check_daemon_status, clear_daemonset_node_labels, daemon_pods_on_no_nodes,
    daemon_pods_on_nodes, daemon_pods_per_node, list_schedulable_node_names,
    patch_namespace_node_selector,
};
use crate::framework::{Framework, expect_len, list_params, poll_immediate, update_with_retry};
use crate::{Error, Result, dump};

const DAEMONSET_NAME_LABEL: &str = "daemonset-name";

/// `e2e-xxxxx-daemon-set`
fn daemon_set_name() -> String {
    format!("e2e-{}-daemon-set", rand_string(5))
}

/// Hash of the DaemonSet's current template and the revision name derived from it
fn hash_and_name_for_daemon_set(ds: &DaemonSet) -> Result<(String, String)> {
    let spec = ds
        .spec
        .as_ref()
        .ok_or_else(|| Error::assertion(format!("DaemonSet {} has no spec", ds.name_any())))?;
    let collision_count = ds.status.as_ref().and_then(|s| s.collision_count);
    let hash = compute_hash(&spec.template, collision_count)?;
    let name = format!("{}-{hash}", ds.name_any());
    Ok((hash, name))
}

fn is_owned_by_daemon_set(rev: &ControllerRevision, ds_uid: &str) -> bool {
    rev.owner_references()
        .iter()
        .any(|r| r.kind == "DaemonSet" && r.uid == ds_uid)
}

/// Poll until exactly `quantity` revisions in the namespace match `selector`
async fn wait_for_revision_count(
    f: &Framework,
    revisions: &Api<ControllerRevision>,
    selector: &ListParams,
    quantity: usize,
) -> Result<()> {
    let config = f.config();
    poll_immediate(
        config.poll_interval(),
        config.responding_timeout(),
        &format!("{quantity} ControllerRevision(s)"),
        move || async move {
            info!("Requesting list of ControllerRevisions to confirm quantity");
            let list = revisions.list(selector).await?;
            if list.items.len() != quantity {
                return Ok(false);
            }
            info!("Found {} ControllerRevisions", quantity);
            Ok::<_, Error>(true)
        },
    )
    .await
}

/// Clear the namespace node selector and stale node labels so daemon pods can land anywhere
async fn set_up(f: &Framework) -> Result<()> {
    let updated = patch_namespace_node_selector(f.client(), f.namespace()).await?;
    debug!("Cleared node selector on namespace {}", updated.name_any());
    clear_daemonset_node_labels(f.client()).await
}

/// Delete every DaemonSet in the namespace, wait for its pods to go and tidy node labels
async fn tear_down(f: &Framework) -> Result<()> {
    let config = f.config();
    let daemon_sets: Api<DaemonSet> = Api::namespaced(f.client(), f.namespace());
    let pods: Api<Pod> = Api::namespaced(f.client(), f.namespace());

    for ds in daemon_sets.list(&ListParams::default()).await?.items {
        let name = ds.name_any();
        let uid = ds.uid().unwrap_or_default();
        info!("Deleting DaemonSet {:?}", name);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        if let Err(e) = daemon_sets.delete(&name, &params).await {
            let e = Error::from(e);
            if !e.is_not_found() {
                return Err(e);
            }
        }

        let (pods, uid) = (&pods, uid.as_str());
        poll_immediate(
            config.poll_interval(),
            config.daemonset_timeout(),
            &format!("daemon pods of {name} to be reaped"),
            move || async move {
                let list = pods.list(&ListParams::default()).await?;
                Ok::<_, Error>(daemon_pods_on_no_nodes(&list.items, uid))
            },
        )
        .await?;
    }

    match daemon_sets.list(&ListParams::default()).await {
        Ok(list) => debug!("daemonsets:\n{}", dump(&list.items)),
        Err(e) => debug!("unable to dump daemonsets: {}", e),
    }
    match pods.list(&ListParams::default()).await {
        Ok(list) => debug!("pods:\n{}", dump(&list.items)),
        Err(e) => debug!("unable to dump pods: {}", e),
    }

    clear_daemonset_node_labels(f.client()).await
}

pub async fn lifecycle(f: &Framework) -> Result<()> {
    let result = match set_up(f).await {
        Ok(()) => run_lifecycle(f).await,
        Err(e) => Err(e),
    };
    let cleanup = tear_down(f).await;

    if let (Err(_), Err(e)) = (&result, &cleanup) {
        warn!("DaemonSet cleanup also failed: {}", e);
    }
    result.and(cleanup)
}

async fn run_lifecycle(f: &Framework) -> Result<()> {
    let ns = f.namespace();
    let config = f.config();
    let daemon_sets: Api<DaemonSet> = Api::namespaced(f.client(), ns);
    let revisions: Api<ControllerRevision> = Api::namespaced(f.client(), ns);
    let pods: Api<Pod> = Api::namespaced(f.client(), ns);

    let ds_name = daemon_set_name();
    let ds_label = BTreeMap::from([(DAEMONSET_NAME_LABEL.to_string(), ds_name.clone())]);
    let ds_selector = list_params(&ds_label);

    info!("Creating DaemonSet {:?}", ds_name);
    let test_daemon_set = daemon_sets
        .create(
            &PostParams::default(),
            &daemon_set_with_label(&ds_name, &config.webserver_image, ds_label.clone()),
        )
        .await?;
    let ds_uid = test_daemon_set.uid().unwrap_or_default();

    info!("Check that daemon pods launch on every node of the cluster.");
    let (client, pods_api, uid) = (f.client(), &pods, ds_uid.as_str());
    poll_immediate(
        config.poll_interval(),
        config.daemonset_timeout(),
        "daemon pods to start",
        move || {
            let client = client.clone();
            async move {
                let nodes = list_schedulable_node_names(client).await?;
                let list = pods_api.list(&ListParams::default()).await?;
                let running = daemon_pods_on_nodes(&list.items, uid, &nodes);
                if !running {
                    debug!(
                        "Daemon pods per node: {:?}, wanted one on each of {:?}",
                        daemon_pods_per_node(&list.items, uid),
                        nodes
                    );
                }
                Ok::<_, Error>(running)
            }
        },
    )
    .await?;
    check_daemon_status(&daemon_sets.get(&ds_name).await?)?;

    info!(
        "Confirm DaemonSet {:?} successfully created with {:?} label",
        ds_name, ds_selector.label_selector
    );
    let all_daemon_sets: Api<DaemonSet> = Api::all(f.client());
    let ds_list = all_daemon_sets.list(&ds_selector).await?;
    expect_len(&ds_list.items, 1, "DaemonSet with the daemonset-name label")?;

    let ds = daemon_sets.get(&ds_name).await?;

    info!(
        "Listing all ControllerRevisions with label {:?}",
        ds_selector.label_selector
    );
    let all_revisions: Api<ControllerRevision> = Api::all(f.client());
    let revs = all_revisions.list(&ds_selector).await?;

    let mut initial_revision = None;
    for rev in revs.items.iter().filter(|r| is_owned_by_daemon_set(r, &ds_uid)) {
        info!("Located ControllerRevision: {:?}", rev.name_any());
        initial_revision = Some(revisions.get(&rev.name_any()).await?);
    }
    let initial_revision = initial_revision.ok_or_else(|| {
        Error::assertion(format!("no ControllerRevision owned by DaemonSet {ds_name}"))
    })?;
    let initial_name = initial_revision.name_any();

    info!("Patching ControllerRevision {:?}", initial_name);
    let patch = json!({ "metadata": { "labels": { initial_name.as_str(): "patched" } } });
    let patched = revisions
        .patch(&initial_name, &PatchParams::default(), &Patch::Strategic(&patch))
        .await?;
    info!("{} has been patched", patched.name_any());

    info!("Create a new ControllerRevision");
    let (new_hash, new_name) = hash_and_name_for_daemon_set(&ds)?;
    let new_revision = controller_revision_for(
        &ds,
        &new_name,
        &new_hash,
        initial_revision.data.clone(),
        initial_revision.revision + 1,
    );
    let created = revisions
        .create(&PostParams::default(), &new_revision)
        .await?;
    info!("Created ControllerRevision: {}", created.name_any());

    info!("Deleting ControllerRevision {:?}", initial_name);
    revisions
        .delete(&initial_name, &DeleteParams::default())
        .await?;

    info!("Confirm that there is only one ControllerRevision");
    wait_for_revision_count(f, &revisions, &ds_selector, 1).await?;

    let current = revisions.list(&ListParams::default()).await?;
    let current_name = current
        .items
        .first()
        .map(|r| r.name_any())
        .ok_or_else(|| Error::assertion(format!("no ControllerRevision left in {ns}")))?;

    info!("Updating ControllerRevision {:?}", current_name);
    let updated = update_with_retry(&revisions, &current_name, |rev: &mut ControllerRevision| {
        rev.labels_mut()
            .insert(current_name.clone(), "updated".to_string());
    })
    .await?;
    info!("{} has been updated", updated.name_any());

    info!("Generate another ControllerRevision by patching the Daemonset");
    let patch = json!({
        "spec": {
            "template": { "spec": { "terminationGracePeriodSeconds": 1 } },
            "updateStrategy": { "type": "RollingUpdate" },
        }
    });
    daemon_sets
        .patch(&ds_name, &PatchParams::default(), &Patch::Strategic(&patch))
        .await?;

    info!("Confirm that there are two ControllerRevisions");
    wait_for_revision_count(f, &revisions, &ds_selector, 2).await?;

    let updated_label = BTreeMap::from([(updated.name_any(), "updated".to_string())]);
    let updated_selector = list_params(&updated_label);
    info!(
        "Removing a ControllerRevision via 'DeleteCollection' with labelSelector: {:?}",
        updated_selector.label_selector
    );
    revisions
        .delete_collection(&DeleteParams::default(), &updated_selector)
        .await?;

    info!("Confirm that there is only one ControllerRevision");
    wait_for_revision_count(f, &revisions, &ds_selector, 1).await?;

    Ok(())
}
