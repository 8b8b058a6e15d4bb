//! Request payloads used by the conformance suites
//!
//! Each builder returns the minimal object the API server will accept for the
//! scenario; everything not named here is left to server-side defaulting.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{ControllerRevision, DaemonSet, DaemonSetSpec};
use k8s_openapi::api::authorization::v1::{
    LocalSubjectAccessReview, ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, LimitRange, LimitRangeItem, LimitRangeSpec, Pod, PodSpec,
    PodTemplateSpec, ResourceRequirements, SecurityContext,
};
use k8s_openapi::api::storage::v1::{
    CSINode, CSINodeDriver, CSINodeSpec, StorageClass, VolumeAttachment, VolumeAttachmentSource,
    VolumeAttachmentSpec, VolumeAttachmentStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use kube::core::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::framework::hash::rand_string;

/// Provisioner that no controller serves, so StorageClasses stay inert
pub const FAKE_PROVISIONER: &str = "e2e-fake-provisioner";

/// Attacher that no CSI driver serves, so VolumeAttachments stay inert
pub const FAKE_ATTACHER: &str = "e2e-test.storage.k8s.io";

/// CSI driver name used for CSINode fixtures
pub const FAKE_CSI_DRIVER: &str = "e2e-fake-csi-driver.storage.k8s.io";

/// Label the DaemonSet controller puts on the revisions it owns
pub const CONTROLLER_REVISION_HASH_LABEL: &str = "controller-revision-hash";

/// Port exposed by DaemonSet pods
pub const DAEMON_PORT: i32 = 9376;

pub type ResourceList = BTreeMap<String, Quantity>;

/// `prefix` followed by five random characters, e.g. `e2e-limitrange-x7kq2`
pub fn random_name(prefix: &str) -> String {
    format!("{prefix}{}", rand_string(5))
}

/// StorageClass with a server-generated name
pub fn storage_class(generate_name: &str) -> StorageClass {
    StorageClass {
        metadata: ObjectMeta {
            generate_name: Some(generate_name.to_string()),
            ..Default::default()
        },
        provisioner: FAKE_PROVISIONER.to_string(),
        ..Default::default()
    }
}

/// VolumeAttachment of persistent volume `pv_name` to `node_name`
pub fn volume_attachment(
    name: &str,
    pv_name: &str,
    node_name: &str,
    attached: bool,
) -> VolumeAttachment {
    VolumeAttachment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: VolumeAttachmentSpec {
            attacher: FAKE_ATTACHER.to_string(),
            node_name: node_name.to_string(),
            source: VolumeAttachmentSource {
                persistent_volume_name: Some(pv_name.to_string()),
                ..Default::default()
            },
        },
        status: Some(VolumeAttachmentStatus {
            attached,
            ..Default::default()
        }),
    }
}

/// CSINode registering a single fake driver
pub fn csi_node(name: &str) -> CSINode {
    CSINode {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: CSINodeSpec {
            drivers: vec![CSINodeDriver {
                name: FAKE_CSI_DRIVER.to_string(),
                node_id: name.to_string(),
                ..Default::default()
            }],
        },
    }
}

/// Bounds and defaults for one LimitRange item
#[derive(Clone, Debug, Default)]
pub struct LimitBounds {
    pub min: ResourceList,
    pub max: ResourceList,
    pub default_limit: ResourceList,
    pub default_request: ResourceList,
    pub max_limit_request_ratio: ResourceList,
}

fn non_empty(list: &ResourceList) -> Option<ResourceList> {
    (!list.is_empty()).then(|| list.clone())
}

/// Container-scoped LimitRange item
pub fn container_limit_item(bounds: &LimitBounds) -> LimitRangeItem {
    LimitRangeItem {
        type_: "Container".to_string(),
        min: non_empty(&bounds.min),
        max: non_empty(&bounds.max),
        default: non_empty(&bounds.default_limit),
        default_request: non_empty(&bounds.default_request),
        max_limit_request_ratio: non_empty(&bounds.max_limit_request_ratio),
    }
}

/// LimitRange with a single container item
pub fn limit_range(name: &str, labels: BTreeMap<String, String>, bounds: &LimitBounds) -> LimitRange {
    LimitRange {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(LimitRangeSpec {
            limits: vec![container_limit_item(bounds)],
        }),
    }
}

/// Pod with one pause container carrying the given requests and limits
pub fn test_pod(name: &str, image: &str, requests: ResourceList, limits: ResourceList) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "pause".to_string(),
                image: Some(image.to_string()),
                resources: Some(ResourceRequirements {
                    requests: non_empty(&requests),
                    limits: non_empty(&limits),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// DaemonSet whose object, selector and pod template all carry `labels`
pub fn daemon_set_with_label(name: &str, image: &str, labels: BTreeMap<String, String>) -> DaemonSet {
    DaemonSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "app".to_string(),
                        image: Some(image.to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: DAEMON_PORT,
                            ..Default::default()
                        }]),
                        security_context: Some(SecurityContext::default()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ControllerRevision owned by `ds`, labelled with the template labels plus `hash`
pub fn controller_revision_for(
    ds: &DaemonSet,
    name: &str,
    hash: &str,
    data: Option<RawExtension>,
    revision: i64,
) -> ControllerRevision {
    let mut labels = ds
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap_or_default();
    labels.insert(CONTROLLER_REVISION_HASH_LABEL.to_string(), hash.to_string());

    ControllerRevision {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: ds.namespace(),
            labels: Some(labels),
            annotations: ds.metadata.annotations.clone(),
            owner_references: ds.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        data,
        revision,
    }
}

/// Cluster-scoped review: may `user` perform `verb` on everything in `namespace`
pub fn subject_access_review(namespace: &str, user: &str, verb: &str) -> SubjectAccessReview {
    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                group: Some("*".to_string()),
                verb: Some(verb.to_string()),
                resource: Some("*".to_string()),
                namespace: Some(namespace.to_string()),
                name: Some("*".to_string()),
                ..Default::default()
            }),
            user: Some(user.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Namespaced review: may `user` list core/v1 pods in `namespace`
pub fn local_subject_access_review(namespace: &str, user: &str) -> LocalSubjectAccessReview {
    LocalSubjectAccessReview {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: SubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                verb: Some("list".to_string()),
                group: Some(String::new()),
                version: Some("v1".to_string()),
                resource: Some("pods".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            }),
            user: Some(user.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}
