//! Assertions on API responses
//!
//! Each helper returns [`Error::AssertionFailed`] with a message naming the
//! object and the mismatch, so a failing suite reports what it saw rather
//! than just that something differed.
//!
//! ```ignore
//! let patched = api.patch(&name, &PatchParams::default(), &patch).await?;
//! expect_label(&patched, &name, "patched")?;
//!
//! let list = api.list(&list_params(&labels)).await?;
//! expect_len(&list.items, 1, "StorageClasses with the updated label")?;
//! ```

use std::fmt::Debug;

use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Assert that `obj` carries the label `key=value`
pub fn expect_label<K: ResourceExt>(obj: &K, key: &str, value: &str) -> Result<()> {
    match obj.labels().get(key) {
        Some(actual) if actual == value => Ok(()),
        actual => Err(Error::assertion(format!(
            "expected label {key}={value} on {}, found {:?} (labels: {:?})",
            obj.name_any(),
            actual,
            obj.labels()
        ))),
    }
}

/// Assert that `obj` is named `expected`
pub fn expect_name<K: ResourceExt>(obj: &K, expected: &str) -> Result<()> {
    let actual = obj.name_any();
    if actual != expected {
        return Err(Error::assertion(format!(
            "expected object named {expected}, got {actual}"
        )));
    }
    Ok(())
}

/// Assert that a list holds exactly `expected` items
pub fn expect_len<T>(items: &[T], expected: usize, what: &str) -> Result<()> {
    if items.len() != expected {
        return Err(Error::assertion(format!(
            "expected {expected} {what}, found {}",
            items.len()
        )));
    }
    Ok(())
}

/// Assert that the API server rejected a request
///
/// Only an API status counts as a rejection; transport failures are passed
/// through as errors of their own. A 409 means the name was already taken,
/// which says nothing about whether the request itself was acceptable.
pub fn expect_rejected<T: Debug>(result: Result<T, kube::Error>, what: &str) -> Result<()> {
    match result {
        Err(kube::Error::Api(e)) if e.code == 409 => Err(Error::assertion(format!(
            "expected {what} to be rejected, but it collided with an existing object: {}",
            e.message
        ))),
        Err(kube::Error::Api(e)) => {
            tracing::info!("{} rejected as expected: {} ({})", what, e.message, e.code);
            Ok(())
        }
        Err(e) => Err(e.into()),
        Ok(obj) => Err(Error::assertion(format!(
            "expected {what} to be rejected, but it was accepted: {obj:?}"
        ))),
    }
}

/// Assert that `name` no longer exists, or is already marked for deletion
pub async fn expect_deleted<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Ok(obj) if obj.meta().deletion_timestamp.is_some() => Ok(()),
        Ok(_) => Err(Error::assertion(format!("{name} still exists"))),
        Err(e) => Err(e.into()),
    }
}
