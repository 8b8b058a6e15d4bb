//! Shared setup for integration tests

use std::sync::Arc;

use kube::Client;
use kube_conformance::framework::{SharedCluster, install_crypto_provider};
use kube_conformance::{Framework, FrameworkConfig, Suite, run_suite};

/// Connect to the cluster and return a fresh client
///
/// Logging goes through the test writer so output is captured per test.
pub async fn setup() -> (Client, Arc<SharedCluster>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,kube=warn")
        .with_test_writer()
        .try_init();

    install_crypto_provider().expect("Failed to install crypto provider");

    let cluster = SharedCluster::get().await.expect("Failed to get cluster");
    let client = cluster.new_client().await.expect("Failed to create client");
    (client, cluster)
}

/// Run a suite the way the binary does, failing the test with the suite's error
pub async fn run(suite: Suite) {
    let (client, _cluster) = setup().await;
    let outcome = run_suite(client, suite, FrameworkConfig::default()).await;
    if let Err(e) = &outcome.result {
        panic!("{} failed after {:?}: {}", suite, outcome.duration, e);
    }
}

/// Framework for tests that drive the helpers directly
pub async fn framework(base_name: &str) -> Framework {
    let (client, _cluster) = setup().await;
    Framework::new(
        client,
        base_name,
        Default::default(),
        FrameworkConfig::default(),
    )
    .await
    .expect("Failed to create framework")
}
