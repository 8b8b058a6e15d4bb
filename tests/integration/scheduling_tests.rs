//! LimitRange suites

use kube_conformance::Suite;

use crate::run;

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_limit_range_defaults_applied() {
    run(Suite::LimitRangeDefaults).await;
}

#[tokio::test]
#[ignore = "requires Kubernetes cluster"]
async fn test_limit_range_list_patch_delete_collection() {
    run(Suite::LimitRangeListPatchDeleteCollection).await;
}
