//! Shared plumbing for the mock resource modules

use super::MockHCloudClient;
use crate::common::selector::{matches_selector, selector_to_labels};
use crate::error::{ErrorCode, HCloudError};
use crate::models::{Labels, ListOpts};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a store, recovering the data if a previous test panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record a call and return the injected error for it, if one is queued
pub(crate) fn begin_call(client: &MockHCloudClient, operation: &str) -> Result<(), HCloudError> {
    lock(&client.calls).push(operation.to_string());

    let injected = lock(&client.injected_errors)
        .get_mut(operation)
        .and_then(std::collections::VecDeque::pop_front);

    match injected {
        Some(code) => Err(HCloudError::api(code, format!("injected error for {operation}"))),
        None => Ok(()),
    }
}

/// Label selector of a list call, parsed
pub(crate) fn selector_of(opts: &ListOpts) -> Result<Labels, HCloudError> {
    opts.label_selector
        .as_deref()
        .map_or_else(|| Ok(Labels::new()), selector_to_labels)
}

/// True if a resource passes the list filters
pub(crate) fn matches(name: &str, labels: &Labels, selector: &Labels, opts: &ListOpts) -> bool {
    matches_selector(labels, selector) && opts.name.as_deref().is_none_or(|n| n == name)
}

pub(crate) fn not_found(kind: &str, id: u64) -> HCloudError {
    HCloudError::api(ErrorCode::NotFound, format!("{kind} with ID {id} not found"))
}

pub(crate) fn name_taken(kind: &str, name: &str) -> HCloudError {
    HCloudError::api(
        ErrorCode::UniquenessError,
        format!("{kind} with name {name} already exists"),
    )
}
