//! Helper functions shared by the services
//!
//! Set reconciliation, CIDR validation and error aggregation.

use crate::services::ServiceError;
use ipnet::IpNet;
use std::collections::BTreeSet;
use std::fmt;

/// Result of comparing a desired set of keys against what exists remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDifference<K: Ord> {
    /// Desired but missing remotely
    pub to_create: BTreeSet<K>,
    /// Present remotely but no longer desired
    pub to_delete: BTreeSet<K>,
    /// Present on both sides
    pub unchanged: BTreeSet<K>,
}

impl<K: Ord> SetDifference<K> {
    /// True if nothing has to be created or deleted
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute desired-minus-existing and existing-minus-desired.
///
/// Duplicate keys on either side collapse; the three result sets are disjoint.
pub fn difference<K, D, E>(desired: D, existing: E) -> SetDifference<K>
where
    K: Ord + Clone,
    D: IntoIterator<Item = K>,
    E: IntoIterator<Item = K>,
{
    let desired: BTreeSet<K> = desired.into_iter().collect();
    let existing: BTreeSet<K> = existing.into_iter().collect();

    SetDifference {
        to_create: desired.difference(&existing).cloned().collect(),
        to_delete: existing.difference(&desired).cloned().collect(),
        unchanged: desired.intersection(&existing).cloned().collect(),
    }
}

/// Parse a CIDR from a spec field, normalised to its network address.
pub fn parse_cidr(value: &str, field: &'static str) -> Result<IpNet, ServiceError> {
    value
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|e| ServiceError::InvalidField {
            field,
            message: format!("invalid CIDR {value:?}: {e}"),
        })
}

/// Several independent failures of one step
#[derive(Debug)]
pub struct AggregateError {
    pub context: String,
    pub errors: Vec<ServiceError>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregate error - {}: [", self.context)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for AggregateError {}

/// `Ok` when `errors` is empty, otherwise an aggregate under `context`.
pub fn join_errors(context: &str, errors: Vec<ServiceError>) -> Result<(), ServiceError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(ServiceError::Aggregate(AggregateError {
        context: context.to_string(),
        errors,
    }))
}
