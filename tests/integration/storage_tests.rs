//! Storage API suites: StorageClass, VolumeAttachment and CSINode

use kube_conformance::Suite;

use crate::run;

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_storage_class_lifecycle() {
    run(Suite::StorageClassLifecycle).await;
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_volume_attachment_lifecycle() {
    run(Suite::VolumeAttachmentLifecycle).await;
}

/// Needs at least one node whose kubelet registered a CSINode
#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_csi_node_list_and_get() {
    run(Suite::CsiNodeListAndGet).await;
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_csi_node_lifecycle() {
    run(Suite::CsiNodeLifecycle).await;
}
