//! Test namespace management for isolation

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use kube::api::{DeleteParams, PostParams, PropagationPolicy};
use kube::core::ObjectMeta;
use kube::{Api, Client};
use uuid::Uuid;

use crate::Result;
use crate::framework::wait::wait_for_resource;

/// Label carried by every namespace this framework creates
pub const FRAMEWORK_LABEL: &str = "kube-conformance.e2e/framework";

/// Label recording the suite's base name
pub const BASE_NAME_LABEL: &str = "kube-conformance.e2e/base-name";

const POD_SECURITY_MODES: [&str; 3] = ["enforce", "warn", "audit"];

/// Pod Security Admission level enforced on a test namespace
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PodSecurityLevel {
    Privileged,
    Baseline,
    #[default]
    Restricted,
}

impl PodSecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodSecurityLevel::Privileged => "privileged",
            PodSecurityLevel::Baseline => "baseline",
            PodSecurityLevel::Restricted => "restricted",
        }
    }
}

impl fmt::Display for PodSecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels applied to a test namespace
pub fn namespace_labels(base_name: &str, level: PodSecurityLevel) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (FRAMEWORK_LABEL.to_string(), "true".to_string()),
        (BASE_NAME_LABEL.to_string(), base_name.to_string()),
    ]);
    for mode in POD_SECURITY_MODES {
        labels.insert(
            format!("pod-security.kubernetes.io/{mode}"),
            level.as_str().to_string(),
        );
    }
    labels
}

/// A test namespace, removed by [`TestNamespace::cleanup`]
pub struct TestNamespace {
    /// Name of the namespace
    pub name: String,
    client: Client,
}

impl TestNamespace {
    /// Create a new unique namespace for test isolation
    ///
    /// The namespace name is generated as `{base_name}-{uuid8}`. Returns once
    /// the namespace's `default` ServiceAccount exists, since pods cannot be
    /// admitted before that. If it never appears the namespace is deleted
    /// again before the error is returned.
    pub async fn create(
        client: Client,
        base_name: &str,
        level: PodSecurityLevel,
        timeout: Duration,
    ) -> Result<Self> {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let name = format!("{}-{}", base_name, suffix);

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(namespace_labels(base_name, level)),
                ..Default::default()
            },
            ..Default::default()
        };

        let namespaces: Api<Namespace> = Api::all(client.clone());
        namespaces.create(&PostParams::default(), &ns).await?;

        tracing::info!("Created test namespace: {} (pod security: {})", name, level);

        let service_accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), &name);
        let namespace = Self { name, client };

        // Nobody else holds the namespace yet, so remove it here on failure
        if let Err(e) = wait_for_resource(&service_accounts, "default", timeout).await {
            tracing::warn!("Namespace {} never became usable: {}", namespace.name, e);
            if let Err(cleanup) = namespace.cleanup().await {
                tracing::warn!("Failed to delete namespace {}: {}", namespace.name, cleanup);
            }
            return Err(e);
        }

        Ok(namespace)
    }

    /// Get the namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initiate deletion of the namespace and everything in it
    ///
    /// Does not wait for completion; the namespace controller finishes in the background.
    pub async fn cleanup(&self) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        tracing::debug!("Initiating deletion of namespace: {}", self.name);

        let dp = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };

        match namespaces.delete(&self.name, &dp).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Namespace {} deletion initiated", self.name);

        Ok(())
    }
}
