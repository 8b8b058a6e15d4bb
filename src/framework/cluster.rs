//! Cluster connection
//!
//! Uses the inferred kubeconfig (~/.kube/config, the KUBECONFIG environment
//! variable, or the in-cluster service account).

use std::sync::Arc;

use kube::{Client, Config};
use tokio::sync::OnceCell;

use crate::Result;

/// Process-wide connection, verified once
static SHARED_CLUSTER: OnceCell<Arc<SharedCluster>> = OnceCell::const_new();

/// Install the rustls crypto provider before any TLS operation
///
/// Installing twice fails; that is fine as long as some provider is in place.
pub fn install_crypto_provider() -> Result<(), String> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err(
            "Failed to install rustls crypto provider and no provider is available".to_string(),
        );
    }
    Ok(())
}

/// A cluster reachable through kubeconfig, shared by every suite in the process
pub struct SharedCluster {
    platform: String,
    git_version: String,
}

impl SharedCluster {
    /// Get or initialize the shared cluster
    pub async fn get() -> Result<Arc<SharedCluster>> {
        SHARED_CLUSTER
            .get_or_try_init(|| async {
                let cluster = Self::connect().await?;
                Ok(Arc::new(cluster))
            })
            .await
            .map(Arc::clone)
    }

    /// Create a new kube Client
    pub async fn new_client(&self) -> Result<Client> {
        connect_client().await
    }

    /// `platform gitVersion` as reported by the API server
    pub fn server_version(&self) -> String {
        format!("{} {}", self.platform, self.git_version)
    }

    async fn connect() -> Result<Self> {
        let client = connect_client().await?;

        let version = client.apiserver_version().await?;
        tracing::info!(
            "Connected to Kubernetes cluster: {} {}",
            version.platform,
            version.git_version
        );

        Ok(Self {
            platform: version.platform,
            git_version: version.git_version,
        })
    }
}

async fn connect_client() -> Result<Client> {
    let config = Config::infer().await?;
    Ok(Client::try_from(config)?)
}
