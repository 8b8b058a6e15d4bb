//! Framework configuration: images and timeouts used by the suites
//!
//! Every field can be given on the command line or through an `E2E_*`
//! environment variable. [`FrameworkConfig::default`] returns the same values
//! as an empty command line, which is what the integration tests use.

use std::time::Duration;

use clap::Args;

/// Pause image used for pods that only need to be admitted, never run a workload
pub const DEFAULT_PAUSE_IMAGE: &str = "registry.k8s.io/pause:3.10";

/// Webserver image used by DaemonSet pods
pub const DEFAULT_WEBSERVER_IMAGE: &str = "registry.k8s.io/e2e-test-images/httpd:2.4.38-4";

#[derive(Args, Clone, Debug)]
pub struct FrameworkConfig {
    /// Image for pods created only to exercise admission
    #[arg(long, env = "E2E_PAUSE_IMAGE", default_value = DEFAULT_PAUSE_IMAGE)]
    pub pause_image: String,

    /// Image for DaemonSet pods
    #[arg(long, env = "E2E_WEBSERVER_IMAGE", default_value = DEFAULT_WEBSERVER_IMAGE)]
    pub webserver_image: String,

    /// Interval between polls of list/get conditions
    #[arg(long, env = "E2E_POLL_INTERVAL_SECS", default_value_t = 1)]
    pub poll_interval_secs: u64,

    /// How long to wait for the API server to reflect a change
    #[arg(long, env = "E2E_RESPONDING_TIMEOUT_SECS", default_value_t = 120)]
    pub responding_timeout_secs: u64,

    /// How long to wait for daemon pods to start or go away
    #[arg(long, env = "E2E_DAEMONSET_TIMEOUT_SECS", default_value_t = 300)]
    pub daemonset_timeout_secs: u64,

    /// How long to wait for a fresh test namespace to become usable
    #[arg(long, env = "E2E_NAMESPACE_TIMEOUT_SECS", default_value_t = 60)]
    pub namespace_timeout_secs: u64,

    /// Delete test namespaces after each suite
    #[arg(
        long,
        env = "E2E_DELETE_NAMESPACE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub delete_namespace: bool,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            pause_image: DEFAULT_PAUSE_IMAGE.to_string(),
            webserver_image: DEFAULT_WEBSERVER_IMAGE.to_string(),
            poll_interval_secs: 1,
            responding_timeout_secs: 120,
            daemonset_timeout_secs: 300,
            namespace_timeout_secs: 60,
            delete_namespace: true,
        }
    }
}

impl FrameworkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn responding_timeout(&self) -> Duration {
        Duration::from_secs(self.responding_timeout_secs)
    }

    pub fn daemonset_timeout(&self) -> Duration {
        Duration::from_secs(self.daemonset_timeout_secs)
    }

    pub fn namespace_timeout(&self) -> Duration {
        Duration::from_secs(self.namespace_timeout_secs)
    }
}
