//! StorageClass lifecycle

use std::collections::BTreeMap;

use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::info;

use crate::fixtures;
use crate::framework::{
    Framework, expect_label, expect_len, expect_name, list_params, update_with_retry,
};
use crate::Result;

pub async fn lifecycle(f: &Framework) -> Result<()> {
    let sc_client: Api<StorageClass> = Api::all(f.client());

    info!("Creating a StorageClass");
    let created = sc_client
        .create(&PostParams::default(), &fixtures::storage_class("e2e-"))
        .await?;
    let name = created.name_any();

    info!("Get StorageClass {:?}", name);
    let retrieved = sc_client.get(&name).await?;
    expect_name(&retrieved, &name)?;

    info!("Patching the StorageClass {:?}", name);
    let patch = json!({ "metadata": { "labels": { name.as_str(): "patched" } } });
    let patched = sc_client
        .patch(&name, &PatchParams::default(), &Patch::Strategic(&patch))
        .await?;
    expect_label(&patched, &name, "patched")?;

    info!("Delete StorageClass {:?}", name);
    sc_client.delete(&name, &DeleteParams::default()).await?;

    info!("Create a replacement StorageClass");
    let replacement = sc_client
        .create(&PostParams::default(), &fixtures::storage_class("e2e-v2-"))
        .await?;
    let replacement_name = replacement.name_any();

    info!("Updating StorageClass {:?}", replacement_name);
    let updated_labels = BTreeMap::from([(replacement_name.clone(), "updated".to_string())]);
    let updated = update_with_retry(&sc_client, &replacement_name, |sc: &mut StorageClass| {
        sc.metadata.labels = Some(updated_labels.clone());
    })
    .await?;
    expect_label(&updated, &replacement_name, "updated")?;

    let selector: ListParams = list_params(&updated_labels);
    info!(
        "Listing all StorageClass with the labelSelector: {:?}",
        selector.label_selector
    );
    let sc_list = sc_client.list(&selector).await?;
    expect_len(&sc_list.items, 1, "StorageClass matching the updated label")?;

    info!(
        "Deleting StorageClass {:?} via DeleteCollection",
        replacement_name
    );
    sc_client
        .delete_collection(&DeleteParams::default(), &selector)
        .await?;

    Ok(())
}
