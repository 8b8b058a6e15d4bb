//! Read-modify-write updates

use std::fmt::Debug;

use kube::api::PostParams;
use kube::{Api, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};
use crate::framework::retry::{Backoff, retry_on_conflict};

/// Get `name`, apply `mutate`, and replace it, starting over whenever the replace conflicts
pub async fn update_with_retry<K, F>(api: &Api<K>, name: &str, mutate: F) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
    F: Fn(&mut K),
{
    let mutate = &mutate;
    retry_on_conflict(&Backoff::default_retry(), move || async move {
        let mut obj = api.get(name).await?;
        mutate(&mut obj);
        Ok::<_, Error>(api.replace(name, &PostParams::default(), &obj).await?)
    })
    .await
}
