//! LimitRange defaulting, admission and collection operations

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use k8s_openapi::api::core::v1::{LimitRange, Pod, ResourceRequirements};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::fixtures::{LimitBounds, ResourceList, limit_range, random_name, test_pod};
use crate::framework::quantity::{equal_resource_list, equal_resource_requirements, resource_list};
use crate::framework::wait::LabelWatch;
use crate::framework::{
    Framework, expect_label, expect_len, expect_rejected, label_selector, list_params,
    list_params_for, poll, poll_immediate,
};
use crate::{Error, Result};

const LIMIT_RANGE_NAME: &str = "limit-range";
const POD_NAME: &str = "pfpod";
const ABOVE_MAX_POD_NAME: &str = "pfpod-above-max";
const TIME_LABEL: &str = "time";

/// Label value unique to one run: sub-second nanos followed by a UUID
fn time_label_value() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{nanos}{}", uuid::Uuid::new_v4())
}

fn initial_bounds() -> LimitBounds {
    LimitBounds {
        min: resource_list("50m", "100Mi", "100Gi"),
        max: resource_list("500m", "500Mi", "500Gi"),
        default_limit: resource_list("500m", "500Mi", "500Gi"),
        default_request: resource_list("100m", "200Mi", "200Gi"),
        max_limit_request_ratio: ResourceList::new(),
    }
}

fn lowered_min() -> ResourceList {
    resource_list("9m", "49Mi", "49Gi")
}

fn requirements(requests: ResourceList, limits: ResourceList) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    }
}

/// Min of the first item of a LimitRange, empty when unset
fn first_item_min(lr: &LimitRange) -> ResourceList {
    lr.spec
        .as_ref()
        .and_then(|s| s.limits.first())
        .and_then(|item| item.min.clone())
        .unwrap_or_default()
}

/// Every container of `pod` must carry `expected` requests and limits
fn expect_pod_requirements(pod: &Pod, expected: &ResourceRequirements) -> Result<()> {
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    for container in containers {
        let actual = container.resources.clone().unwrap_or_default();
        if let Err(e) = equal_resource_requirements(expected, &actual) {
            warn!(
                "Pod {} does not have the expected requirements:\n{}",
                pod.name_any(),
                crate::dump(pod)
            );
            return Err(e);
        }
    }
    Ok(())
}

pub async fn defaults_applied(f: &Framework) -> Result<()> {
    let ns = f.namespace();
    let config = f.config();
    let image = config.pause_image.as_str();
    let limit_ranges: Api<LimitRange> = Api::namespaced(f.client(), ns);
    let pods: Api<Pod> = Api::namespaced(f.client(), ns);

    info!("Creating a LimitRange");
    let bounds = initial_bounds();
    let value = time_label_value();
    let labels = BTreeMap::from([(TIME_LABEL.to_string(), value.clone())]);
    let lr = limit_range(LIMIT_RANGE_NAME, labels.clone(), &bounds);

    info!("Setting up watch");
    let selector = label_selector(&labels).to_string();
    let existing = limit_ranges.list(&list_params_for(&selector)).await?;
    expect_len(&existing.items, 0, "LimitRange matching the run label")?;

    let mut watch = LabelWatch::start(limit_ranges.clone(), &selector);
    watch.synced(config.responding_timeout()).await?;

    info!("Submitting a LimitRange");
    let created = limit_ranges.create(&PostParams::default(), &lr).await?;
    let name = created.name_any();

    info!("Verifying LimitRange creation was observed");
    watch.expect_added(&name, config.responding_timeout()).await?;

    info!("Fetching the LimitRange to ensure it has proper values");
    let fetched = limit_ranges.get(&name).await?;
    let item = fetched
        .spec
        .as_ref()
        .and_then(|s| s.limits.first())
        .ok_or_else(|| Error::assertion(format!("LimitRange {name} has no limits")))?;
    let expected = requirements(bounds.default_request.clone(), bounds.default_limit.clone());
    let actual = requirements(
        item.default_request.clone().unwrap_or_default(),
        item.default.clone().unwrap_or_default(),
    );
    equal_resource_requirements(&expected, &actual)?;

    info!("Creating a Pod with no resource requirements");
    let pod = test_pod("pod-no-resources", image, ResourceList::new(), ResourceList::new());
    let pod = pods.create(&PostParams::default(), &pod).await?;

    info!("Ensuring Pod has resource requirements applied from LimitRange");
    let pod = pods.get(&pod.name_any()).await?;
    expect_pod_requirements(&pod, &expected)?;

    info!("Creating a Pod with partial resource requirements");
    let pod = test_pod(
        "pod-partial-resources",
        image,
        resource_list("", "150Mi", "150Gi"),
        resource_list("300m", "", ""),
    );
    let pod = pods.create(&PostParams::default(), &pod).await?;

    info!("Ensuring Pod has merged resource requirements applied from LimitRange");
    let pod = pods.get(&pod.name_any()).await?;
    // A limit without a request defaults the request to the limit, so the
    // LimitRange default request only fills resources with no limit at all.
    let expected = requirements(
        resource_list("300m", "150Mi", "150Gi"),
        resource_list("300m", "500Mi", "500Gi"),
    );
    expect_pod_requirements(&pod, &expected)?;

    info!("Failing to create a Pod with less than min resources");
    let below_min = test_pod(
        POD_NAME,
        image,
        resource_list("10m", "50Mi", "50Gi"),
        ResourceList::new(),
    );
    expect_rejected(
        pods.create(&PostParams::default(), &below_min).await,
        "pod below min resources",
    )?;

    info!("Failing to create a Pod with more than max resources");
    let above_max = test_pod(
        ABOVE_MAX_POD_NAME,
        image,
        resource_list("600m", "600Mi", "600Gi"),
        ResourceList::new(),
    );
    expect_rejected(
        pods.create(&PostParams::default(), &above_max).await,
        "pod above max resources",
    )?;

    info!("Updating a LimitRange");
    let new_min = lowered_min();
    let mut to_update = fetched;
    if let Some(item) = to_update.spec.as_mut().and_then(|s| s.limits.first_mut()) {
        item.min = Some(new_min.clone());
    }
    let updated = limit_ranges
        .replace(&name, &PostParams::default(), &to_update)
        .await?;
    debug!("Updated LimitRange {} to min {:?}", name, first_item_min(&updated));

    info!("Verifying LimitRange updating is effective");
    let (api, lr_name, want) = (&limit_ranges, name.as_str(), &new_min);
    poll(
        Duration::from_secs(2),
        Duration::from_secs(20),
        "LimitRange update to take effect",
        move || async move {
            let current = api.get(lr_name).await?;
            Ok::<_, Error>(equal_resource_list(want, &first_item_min(&current)).is_ok())
        },
    )
    .await?;

    info!("Creating a Pod with less than former min resources");
    pods.create(&PostParams::default(), &below_min).await?;

    info!("Failing to create a Pod with more than max resources");
    expect_rejected(
        pods.create(&PostParams::default(), &above_max).await,
        "pod above max resources",
    )?;

    info!("Deleting a LimitRange");
    let grace = DeleteParams {
        grace_period_seconds: Some(30),
        ..Default::default()
    };
    limit_ranges.delete(&name, &grace).await?;

    info!("Verifying the LimitRange was deleted");
    let api = &limit_ranges;
    poll(
        Duration::from_secs(5),
        config.responding_timeout(),
        "LimitRange to be deleted",
        move || async move {
            let remaining = match api.list(&ListParams::default()).await {
                Ok(list) => list.items,
                Err(e) => {
                    info!("Unable to retrieve LimitRanges: {}", e);
                    return Ok(false);
                }
            };
            if remaining.is_empty() {
                info!("limitRange is already deleted");
                return Ok(true);
            }
            for lr in &remaining {
                info!(
                    "LimitRange {}/{} has not yet been deleted",
                    lr.namespace().unwrap_or_default(),
                    lr.name_any()
                );
            }
            Ok::<_, Error>(false)
        },
    )
    .await?;

    info!("Creating a Pod with more than former max resources");
    let above_former_max = test_pod(
        &format!("{POD_NAME}2"),
        image,
        resource_list("600m", "600Mi", "600Gi"),
        ResourceList::new(),
    );
    pods.create(&PostParams::default(), &above_former_max).await?;

    Ok(())
}

pub async fn list_patch_delete_collection(f: &Framework) -> Result<()> {
    let lr_client: Api<LimitRange> = Api::namespaced(f.client(), f.namespace());
    let lr_name = random_name("e2e-limitrange-");
    let created_label = BTreeMap::from([(lr_name.clone(), "created".to_string())]);
    let patched_label = BTreeMap::from([(lr_name.clone(), "patched".to_string())]);

    let mut labels = created_label.clone();
    labels.insert(TIME_LABEL.to_string(), time_label_value());
    let lr = limit_range(&lr_name, labels, &initial_bounds());

    info!("Creating LimitRange {:?}", lr_name);
    let created = lr_client.create(&PostParams::default(), &lr).await?;

    let created_selector = list_params(&created_label);
    info!(
        "Listing all LimitRanges with label {:?}",
        created_selector.label_selector
    );
    let all_namespaces: Api<LimitRange> = Api::all(f.client());
    let list = all_namespaces.list(&created_selector).await?;
    expect_len(&list.items, 1, "LimitRange with the created label")?;
    if let Some(found) = list.items.first() {
        info!(
            "Found limitRange {:?} in namespace {:?}",
            found.name_any(),
            found.namespace().unwrap_or_default()
        );
    }

    info!("Patching LimitRange {:?}", lr_name);
    let new_min = lowered_min();
    let mut limits = created.spec.map(|s| s.limits).unwrap_or_default();
    if let Some(item) = limits.first_mut() {
        item.min = Some(new_min.clone());
    }
    let patch = json!({
        "metadata": { "labels": { lr_name.as_str(): "patched" } },
        "spec": { "limits": limits },
    });
    let patched = lr_client
        .patch(&lr_name, &PatchParams::default(), &Patch::Strategic(&patch))
        .await?;
    expect_label(&patched, &lr_name, "patched")?;
    equal_resource_list(&new_min, &first_item_min(&patched)).map_err(|e| {
        Error::assertion(format!(
            "LimitRange does not have the correct min limitRange ({e}). Currently is {:?}",
            first_item_min(&patched)
        ))
    })?;
    info!("LimitRange {:?} has been patched", lr_name);

    let patched_selector = list_params(&patched_label);
    info!(
        "Delete LimitRange {:?} by Collection with labelSelector: {:?}",
        lr_name, patched_selector.label_selector
    );
    lr_client
        .delete_collection(&DeleteParams::default(), &patched_selector)
        .await?;

    info!("Confirm that the limitRange {:?} has been deleted", lr_name);
    let (api, selector) = (&lr_client, &patched_selector);
    poll_immediate(
        Duration::from_secs(1),
        Duration::from_secs(10),
        "LimitRange collection to be deleted",
        move || async move {
            let list = api.list(selector).await?;
            info!("Requesting list of LimitRange to confirm quantity");
            Ok::<_, Error>(list.items.is_empty())
        },
    )
    .await?;
    info!("LimitRange {:?} has been deleted.", lr_name);

    Ok(())
}
