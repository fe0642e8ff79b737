//! Label selector encoding
//!
//! The Hetzner Cloud API filters list calls with equality selectors of the
//! form `key1==value1,key2==value2`. The same labels are attached to every
//! resource we create, so both directions are needed.

use crate::error::HCloudError;
use crate::models::Labels;

/// Encode a label map as an equality selector.
///
/// Keys are emitted in sorted order so the result is stable.
#[must_use]
pub fn labels_to_selector(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}=={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse an equality selector back into a label map.
///
/// Accepts `==` and `=` as the operator. An empty selector yields an empty map.
///
/// # Errors
///
/// Returns [`HCloudError::InvalidSelector`] when a term has no operator or an
/// empty key.
pub fn selector_to_labels(selector: &str) -> Result<Labels, HCloudError> {
    let mut labels = Labels::new();

    for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (key, value) = term
            .split_once("==")
            .or_else(|| term.split_once('='))
            .ok_or_else(|| HCloudError::InvalidSelector(format!("missing operator in '{term}'")))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(HCloudError::InvalidSelector(format!("empty key in '{term}'")));
        }
        labels.insert(key.to_string(), value.trim().to_string());
    }

    Ok(labels)
}

/// True if every label in `selector` is present with the same value in `labels`
#[must_use]
pub fn matches_selector(labels: &Labels, selector: &Labels) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}
