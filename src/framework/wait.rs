//! Watch-based wait helpers

use std::fmt::Debug;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use kube::runtime::wait::{Condition, await_condition};
use kube::runtime::watcher::{self, Event, watcher};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Condition that checks if a resource exists (is not None)
pub fn exists<T>() -> impl Condition<T>
where
    T: Resource,
{
    |obj: Option<&T>| obj.is_some()
}

/// Wait for a resource to satisfy a condition, returning the matching object
pub async fn wait_for<T, C>(api: &Api<T>, name: &str, condition: C, timeout: Duration) -> Result<T>
where
    T: Resource + Clone + Debug + Send + Sync + DeserializeOwned + 'static,
    C: Condition<T>,
{
    let cond = await_condition(api.clone(), name, condition);

    let result = tokio::time::timeout(timeout, cond)
        .await
        .map_err(|_| Error::timeout(format!("condition on {name}"), timeout))??;

    result.ok_or_else(|| Error::Precondition(format!("{name} not found after wait")))
}

/// Wait for any resource to exist using watches
pub async fn wait_for_resource<T>(api: &Api<T>, name: &str, timeout: Duration) -> Result<T>
where
    T: Resource + Clone + Debug + Send + Sync + DeserializeOwned + 'static,
{
    wait_for(api, name, exists::<T>(), timeout).await
}

/// Condition that holds once the object with `uid` is gone
///
/// A live object under the same name with a different uid is a replacement,
/// so the original counts as deleted. Without a uid only absence matches.
pub fn is_gone<T>(uid: Option<String>) -> impl Condition<T>
where
    T: Resource,
{
    move |obj: Option<&T>| match (obj, uid.as_deref()) {
        (None, _) => true,
        (Some(obj), Some(uid)) => obj.meta().uid.as_deref() != Some(uid),
        (Some(_), None) => false,
    }
}

/// Wait for any resource to be deleted using watches
pub async fn wait_for_resource_deletion<T>(api: &Api<T>, name: &str, timeout: Duration) -> Result<()>
where
    T: Resource + Clone + Debug + Send + Sync + DeserializeOwned + 'static,
{
    let Some(current) = api.get_opt(name).await? else {
        return Ok(());
    };
    let cond = await_condition(api.clone(), name, is_gone(current.meta().uid.clone()));

    tokio::time::timeout(timeout, cond)
        .await
        .map_err(|_| Error::timeout(format!("deletion of {name}"), timeout))??;

    Ok(())
}

/// A label-filtered watch kept open across several test steps
///
/// Mirrors the informer pattern: start the watch, wait until the initial list
/// has been delivered, perform a write, then assert on the event it produced.
pub struct LabelWatch<K> {
    stream: BoxStream<'static, Result<Event<K>, watcher::Error>>,
    selector: String,
}

impl<K> LabelWatch<K>
where
    K: Resource + Clone + Debug + Send + DeserializeOwned + 'static,
{
    pub fn start(api: Api<K>, selector: &str) -> Self {
        let config = watcher::Config::default().labels(selector);
        Self {
            stream: watcher(api, config).boxed(),
            selector: selector.to_string(),
        }
    }

    /// Wait until the initial list for the selector has been delivered
    pub async fn synced(&mut self, timeout: Duration) -> Result<()> {
        let what = format!("watch on {:?} to sync", self.selector);
        let stream = &mut self.stream;
        let sync = async {
            while let Some(event) = stream.try_next().await? {
                if matches!(event, Event::InitDone) {
                    return Ok(());
                }
            }
            Err(Error::WatchClosed(what.clone()))
        };

        match tokio::time::timeout(timeout, sync).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(what.clone(), timeout)),
        }
    }

    /// Wait for an add/modify event for `name`
    ///
    /// A deletion of `name` arriving first fails the assertion.
    pub async fn expect_added(&mut self, name: &str, timeout: Duration) -> Result<K> {
        let what = format!("{name} to be observed by watch on {:?}", self.selector);
        let stream = &mut self.stream;
        let observe = async {
            while let Some(event) = stream.try_next().await? {
                match event {
                    Event::Apply(obj) | Event::InitApply(obj) if obj.name_any() == name => {
                        return Ok(obj);
                    }
                    Event::Delete(obj) if obj.name_any() == name => {
                        return Err(Error::assertion(format!(
                            "expected creation of {name}, observed deletion"
                        )));
                    }
                    _ => {}
                }
            }
            Err(Error::WatchClosed(what.clone()))
        };

        match tokio::time::timeout(timeout, observe).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(what.clone(), timeout)),
        }
    }
}
