//! Lifecycle conformance scenarios for Kubernetes built-in resources
//!
//! Each suite in [`suites`] drives one resource type through create, get,
//! patch, list-by-label, update with conflict retry, delete and
//! delete-collection against a live API server, asserting on every response.
//! The [`framework`] module supplies what the suites share: a namespace per
//! suite, conflict retry, polling, watches, and semantic comparison of
//! resource quantities.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod framework;
pub mod suites;

pub use config::FrameworkConfig;
pub use error::{Error, Result};
pub use framework::{Framework, PodSecurityLevel};
pub use suites::{Suite, SuiteOutcome, run_suite};

/// Render an object for debug logs
pub fn dump<T: serde::Serialize>(obj: &T) -> String {
    serde_yaml::to_string(obj).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
