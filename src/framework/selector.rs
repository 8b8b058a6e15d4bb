//! Label selectors for list and delete-collection calls

use std::collections::BTreeMap;

use kube::api::ListParams;
use kube::core::Selector;

/// Equality selector matching every label in `labels`
///
/// Keys come out in sorted order, so the rendered form is stable: `a=1,b=2`.
pub fn label_selector(labels: &BTreeMap<String, String>) -> Selector {
    labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Equality selector for a single `key=value` pair
pub fn single_label_selector(key: &str, value: &str) -> Selector {
    label_selector(&BTreeMap::from([(key.to_string(), value.to_string())]))
}

/// List parameters filtering on `labels`
pub fn list_params(labels: &BTreeMap<String, String>) -> ListParams {
    ListParams::default().labels_from(&label_selector(labels))
}

/// List parameters filtering on an already rendered selector
pub fn list_params_for(selector: &str) -> ListParams {
    ListParams::default().labels(selector)
}
