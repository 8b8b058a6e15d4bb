//! CSINode listing and lifecycle

use std::collections::BTreeMap;

use k8s_openapi::api::storage::v1::CSINode;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::fixtures::{csi_node, random_name};
use crate::framework::{
    Framework, expect_deleted, expect_label, expect_len, expect_name, list_params, poll_immediate,
    update_with_retry,
};
use crate::{Error, Result, dump};

/// List the CSINodes kubelets have registered and read one back by name
pub async fn list_and_get(f: &Framework) -> Result<()> {
    let csi_nodes: Api<CSINode> = Api::all(f.client());

    info!("Listing CSINodes");
    let list = csi_nodes.list(&ListParams::default()).await?;
    debug!("csiNodeList:\n{}", dump(&list.items));

    let first = list
        .items
        .first()
        .ok_or_else(|| Error::Precondition("no CSINode objects registered in the cluster".to_string()))?;
    let name = first.name_any();

    info!("Getting CSINode {:?}", name);
    let csi_node = csi_nodes.get(&name).await?;
    expect_name(&csi_node, &name)?;
    debug!("csiNode:\n{}", dump(&csi_node));

    Ok(())
}

pub async fn lifecycle(f: &Framework) -> Result<()> {
    let csi_nodes: Api<CSINode> = Api::all(f.client());
    let name = random_name("e2e-csinode-");

    info!("Creating CSINode {:?}", name);
    let created = csi_nodes
        .create(&PostParams::default(), &csi_node(&name))
        .await?;
    expect_name(&created, &name)?;

    info!("Getting CSINode {:?}", name);
    let retrieved = csi_nodes.get(&name).await?;
    expect_name(&retrieved, &name)?;

    info!("Patching CSINode {:?}", name);
    let patch = json!({ "metadata": { "labels": { name.as_str(): "patched" } } });
    let patched = csi_nodes
        .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    expect_label(&patched, &name, "patched")?;

    let patched_labels = BTreeMap::from([(name.clone(), "patched".to_string())]);
    info!("Listing CSINodes with label {}={}", name, "patched");
    let list = csi_nodes.list(&list_params(&patched_labels)).await?;
    expect_len(&list.items, 1, "CSINode with the patched label")?;

    info!("Deleting CSINode {:?}", name);
    csi_nodes.delete(&name, &DeleteParams::default()).await?;
    expect_deleted(&csi_nodes, &name).await?;

    let name = random_name("e2e-csinode-");
    info!("Creating replacement CSINode {:?}", name);
    csi_nodes
        .create(&PostParams::default(), &csi_node(&name))
        .await?;

    info!("Updating CSINode {:?}", name);
    let updated_labels = BTreeMap::from([(name.clone(), "updated".to_string())]);
    let updated = update_with_retry(&csi_nodes, &name, |node: &mut CSINode| {
        node.labels_mut().extend(updated_labels.clone());
    })
    .await?;
    expect_label(&updated, &name, "updated")?;

    let selector = list_params(&updated_labels);
    let list = csi_nodes.list(&selector).await?;
    expect_len(&list.items, 1, "CSINode with the updated label")?;

    info!("Deleting CSINode {:?} via DeleteCollection", name);
    csi_nodes
        .delete_collection(&DeleteParams::default(), &selector)
        .await?;

    let config = f.config();
    let (api, selector) = (&csi_nodes, &selector);
    poll_immediate(
        config.poll_interval(),
        config.responding_timeout(),
        "CSINode collection to be deleted",
        move || async move {
            let remaining = api.list(selector).await?;
            Ok::<_, Error>(remaining.items.is_empty())
        },
    )
    .await?;

    Ok(())
}
