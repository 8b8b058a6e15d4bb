//! Error types shared by the framework and the conformance suites

use std::time::Duration;

use thiserror::Error;

/// Error variants are named with the `Error` suffix where they wrap another crate's error.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to infer kubeconfig: {0}")]
    InferConfigError(#[from] kube::config::InferConfigError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] kube::runtime::watcher::Error),

    #[error("Wait error: {0}")]
    WaitError(#[from] kube::runtime::wait::Error),

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("Invalid quantity {input:?}: {reason}")]
    InvalidQuantity { input: String, reason: &'static str },

    #[error("Watch stream ended before {0}")]
    WatchClosed(String),
}

impl Error {
    /// HTTP status code of the API error, if this is one
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::KubeError(kube::Error::Api(e)) => Some(e.code),
            _ => None,
        }
    }

    /// Optimistic-concurrency conflict (409) reported by the API server
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    pub(crate) fn assertion(msg: impl Into<String>) -> Self {
        Error::AssertionFailed(msg.into())
    }

    pub(crate) fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            timeout,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
