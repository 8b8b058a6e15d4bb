//! VolumeAttachment lifecycle

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::storage::v1::VolumeAttachment;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use rand::Rng;
use serde_json::json;
use tracing::info;

use crate::fixtures::volume_attachment;
use crate::framework::hash::rand_string;
use crate::framework::{
    Framework, expect_label, expect_len, expect_name, single_label_selector, update_with_retry,
};
use crate::{Error, Result};

/// Names for one attachment: `va-e2e-xxxxx` and its PV `pv-e2e-xxxxx`
fn attachment_names() -> (String, String) {
    let suffix = rand_string(5);
    (format!("va-e2e-{suffix}"), format!("pv-e2e-{suffix}"))
}

pub async fn lifecycle(f: &Framework) -> Result<()> {
    let va_client: Api<VolumeAttachment> = Api::all(f.client());

    let nodes: Api<Node> = Api::all(f.client());
    let node_list = nodes.list(&ListParams::default()).await?;
    if node_list.items.is_empty() {
        return Err(Error::Precondition("cluster has no nodes".to_string()));
    }
    let pick = rand::rng().random_range(0..node_list.items.len());
    let node_name = node_list
        .items
        .get(pick)
        .map(|n| n.name_any())
        .unwrap_or_default();

    let (va_name, pv_name) = attachment_names();

    info!("Create VolumeAttachment {:?} on node {:?}", va_name, node_name);
    let created = va_client
        .create(
            &PostParams::default(),
            &volume_attachment(&va_name, &pv_name, &node_name, false),
        )
        .await?;
    expect_name(&created, &va_name)?;

    info!("Get VolumeAttachment {:?} on node {:?}", va_name, node_name);
    let retrieved = va_client.get(&va_name).await?;
    expect_name(&retrieved, &va_name)?;

    info!("Patch VolumeAttachment {:?} on node {:?}", va_name, node_name);
    let patch = json!({ "metadata": { "labels": { va_name.as_str(): "patched" } } });
    let patched = va_client
        .patch(&va_name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    expect_label(&patched, &va_name, "patched")?;

    let patched_selector = single_label_selector(&va_name, "patched");
    info!("List VolumeAttachments with {:?} label", patched_selector.to_string());
    let va_list = va_client
        .list(&ListParams::default().labels_from(&patched_selector))
        .await?;
    expect_len(&va_list.items, 1, "VolumeAttachment with the patched label")?;

    info!("Delete VolumeAttachment {:?} on node {:?}", va_name, node_name);
    va_client.delete(&va_name, &DeleteParams::default()).await?;

    let (va_name, pv_name) = attachment_names();

    info!(
        "Create replacement VolumeAttachment {:?} on node {:?}",
        va_name, node_name
    );
    let replacement = va_client
        .create(
            &PostParams::default(),
            &volume_attachment(&va_name, &pv_name, &node_name, false),
        )
        .await?;
    expect_name(&replacement, &va_name)?;

    info!("Update the VolumeAttachment {:?} on node {:?}", va_name, node_name);
    let updated_labels = BTreeMap::from([(va_name.clone(), "updated".to_string())]);
    let updated = update_with_retry(&va_client, &va_name, |va: &mut VolumeAttachment| {
        va.metadata.labels = Some(updated_labels.clone());
    })
    .await?;
    expect_label(&updated, &va_name, "updated")?;

    let updated_selector = single_label_selector(&va_name, "updated");
    info!(
        "DeleteCollection of VolumeAttachments with {:?} label",
        updated_selector.to_string()
    );
    va_client
        .delete_collection(
            &DeleteParams::default(),
            &ListParams::default().labels_from(&updated_selector),
        )
        .await?;

    Ok(())
}
