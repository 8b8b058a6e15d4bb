//! Per-suite test framework: a client, a fresh namespace and the run configuration

pub mod assertions;
pub mod cluster;
pub mod hash;
pub mod namespace;
pub mod nodes;
pub mod quantity;
pub mod retry;
pub mod selector;
pub mod update;
pub mod wait;

use kube::Client;

pub use assertions::{expect_deleted, expect_label, expect_len, expect_name, expect_rejected};
pub use cluster::{SharedCluster, install_crypto_provider};
pub use namespace::{PodSecurityLevel, TestNamespace};
pub use retry::{Backoff, poll, poll_immediate, retry_on_conflict, retry_on_error};
pub use selector::{label_selector, list_params, list_params_for, single_label_selector};
pub use update::update_with_retry;

use crate::{FrameworkConfig, Result};

/// Everything a suite needs: created before it runs, torn down after
pub struct Framework {
    client: Client,
    namespace: TestNamespace,
    config: FrameworkConfig,
}

impl Framework {
    /// Create the suite's namespace and wait until pods can be admitted into it
    pub async fn new(
        client: Client,
        base_name: &str,
        level: PodSecurityLevel,
        config: FrameworkConfig,
    ) -> Result<Self> {
        let namespace =
            TestNamespace::create(client.clone(), base_name, level, config.namespace_timeout())
                .await?;
        Ok(Self {
            client,
            namespace,
            config,
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Name of the suite's namespace
    pub fn namespace(&self) -> &str {
        self.namespace.name()
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// Delete the namespace, unless configured to keep it for inspection
    pub async fn teardown(&self) -> Result<()> {
        if self.config.delete_namespace {
            self.namespace.cleanup().await
        } else {
            tracing::info!("Keeping namespace {} for inspection", self.namespace());
            Ok(())
        }
    }
}
