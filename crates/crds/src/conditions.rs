//! Cluster API style conditions
//!
//! Conditions live in `status.conditions`. Setting a condition only moves its
//! `lastTransitionTime` when the status actually changes, so repeated
//! reconciles do not churn the object.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Condition types
pub const READY: &str = "Ready";
pub const NETWORK_ATTACHED: &str = "NetworkAttached";
pub const LOAD_BALANCER_ATTACHED: &str = "LoadBalancerAttached";
pub const LOAD_BALANCER_ATTACHED_TO_NETWORK: &str = "LoadBalancerAttachedToNetwork";
pub const PLACEMENT_GROUPS_SYNCED: &str = "PlacementGroupsSynced";
pub const HCLOUD_TOKEN_AVAILABLE: &str = "HCloudTokenAvailable";
pub const HETZNER_API_REACHABLE: &str = "HetznerAPIReachable";
pub const CONTROL_PLANE_ENDPOINT_SET: &str = "ControlPlaneEndpointSet";

// Reasons
pub const NETWORK_DISABLED_REASON: &str = "NetworkDisabled";
pub const NETWORK_UNREACHABLE_REASON: &str = "NetworkUnreachable";
pub const LOAD_BALANCER_UNREACHABLE_REASON: &str = "LoadBalancerUnreachable";
pub const LOAD_BALANCER_ATTACH_FAILED_REASON: &str = "LoadBalancerAttachFailed";
pub const LOAD_BALANCER_NO_NETWORK_FOUND_REASON: &str = "LoadBalancerNoNetworkFound";
pub const PLACEMENT_GROUPS_UNREACHABLE_REASON: &str = "PlacementGroupsUnreachable";
pub const HETZNER_SECRET_UNREACHABLE_REASON: &str = "HetznerSecretUnreachable";
pub const HCLOUD_CREDENTIALS_INVALID_REASON: &str = "HCloudCredentialsInvalid";
pub const RATE_LIMIT_EXCEEDED_REASON: &str = "RateLimitExceeded";
pub const CONTROL_PLANE_ENDPOINT_NOT_SET_REASON: &str = "ControlPlaneEndpointNotSet";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// Only set when status is False
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Look up a condition by type
#[must_use]
pub fn get<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// True if the condition exists and is True
#[must_use]
pub fn is_true(conditions: &[Condition], type_: &str) -> bool {
    get(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// True if the condition exists and is False
#[must_use]
pub fn is_false(conditions: &[Condition], type_: &str) -> bool {
    get(conditions, type_).is_some_and(|c| c.status == ConditionStatus::False)
}

/// Insert or replace a condition, keeping the transition time if status is unchanged
pub fn set(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time.or_else(|| Some(Utc::now()))
            } else {
                Some(Utc::now())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(Utc::now());
            conditions.push(condition);
        }
    }
}

/// Set a condition to True
pub fn mark_true(conditions: &mut Vec<Condition>, type_: &str) {
    set(
        conditions,
        Condition {
            type_: type_.to_string(),
            status: ConditionStatus::True,
            severity: None,
            last_transition_time: None,
            reason: None,
            message: None,
        },
    );
}

/// Set a condition to False with a reason and message
pub fn mark_false(
    conditions: &mut Vec<Condition>,
    type_: &str,
    reason: &str,
    severity: ConditionSeverity,
    message: impl Into<String>,
) {
    set(
        conditions,
        Condition {
            type_: type_.to_string(),
            status: ConditionStatus::False,
            severity: Some(severity),
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        },
    );
}

/// Derive the `Ready` condition from all others
///
/// Ready is False with the reason and message of the most severe False
/// condition (Error before Warning before Info), True otherwise. Conditions
/// with severity Info do not block readiness.
pub fn set_summary(conditions: &mut Vec<Condition>) {
    let blocking = conditions
        .iter()
        .filter(|c| c.type_ != READY && c.status == ConditionStatus::False)
        .filter(|c| c.severity != Some(ConditionSeverity::Info))
        .min_by_key(|c| match c.severity {
            Some(ConditionSeverity::Error) | None => 0,
            Some(ConditionSeverity::Warning) => 1,
            Some(ConditionSeverity::Info) => 2,
        })
        .cloned();

    match blocking {
        Some(c) => mark_false(
            conditions,
            READY,
            c.reason.as_deref().unwrap_or_default(),
            c.severity.unwrap_or(ConditionSeverity::Error),
            c.message.unwrap_or_default(),
        ),
        None => mark_true(conditions, READY),
    }
}
