//! Per-reconcile state of one HetznerCluster
//!
//! The scope owns a working copy of the cluster. Services read the spec,
//! write status and conditions, and record events on it; the reconciler
//! persists the status and publishes the events afterwards.

use crate::events::{EventKind, RecordedEvent};
use crate::services::ServiceError;
use crds::conditions::{self, ConditionSeverity, HETZNER_API_REACHABLE, RATE_LIMIT_EXCEEDED_REASON};
use crds::{Condition, HetznerCluster, HetznerClusterStatus};
use hcloud_client::{HCloudClientTrait, HCloudError, Labels, ListOpts, labels_to_selector};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::warn;

pub struct ClusterScope {
    pub cluster: HetznerCluster,
    pub hcloud: Arc<dyn HCloudClientTrait>,
    events: Vec<RecordedEvent>,
}

impl ClusterScope {
    pub fn new(cluster: HetznerCluster, hcloud: Arc<dyn HCloudClientTrait>) -> Self {
        Self {
            cluster,
            hcloud,
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> String {
        self.cluster.name_any()
    }

    pub fn namespace(&self) -> String {
        self.cluster.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// `namespace/name`, used in logs and error messages
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    /// Labels every owned remote resource carries
    pub fn owned_labels(&self) -> Labels {
        self.cluster.owned_labels()
    }

    /// List options selecting the owned remote resources
    pub fn owned_list_opts(&self) -> ListOpts {
        ListOpts::with_label_selector(labels_to_selector(&self.owned_labels()))
    }

    pub fn status(&self) -> Option<&HetznerClusterStatus> {
        self.cluster.status.as_ref()
    }

    pub fn status_mut(&mut self) -> &mut HetznerClusterStatus {
        self.cluster.status_mut()
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status().map_or(&[], |s| s.conditions.as_slice())
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status_mut().conditions
    }

    pub fn record_normal(&mut self, reason: &str, note: impl Into<String>) {
        self.record(EventKind::Normal, reason, note.into());
    }

    pub fn record_warning(&mut self, reason: &str, note: impl Into<String>) {
        self.record(EventKind::Warning, reason, note.into());
    }

    fn record(&mut self, kind: EventKind, reason: &str, note: String) {
        self.events.push(RecordedEvent {
            kind,
            reason: reason.to_string(),
            note,
        });
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Drain the recorded events for publishing
    pub fn take_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Convert a failed Hetzner Cloud call into a [`ServiceError`].
    ///
    /// A rate limit additionally marks `HetznerAPIReachable` False and records
    /// a warning event, so the next passes back off until the wait is over.
    pub fn hcloud_error(&mut self, context: impl Into<String>, err: HCloudError) -> ServiceError {
        let err = ServiceError::hcloud(context, err);
        if err.is_rate_limit() {
            warn!("Hetzner Cloud rate limit exceeded for HetznerCluster {}: {}", self.key(), err);
            conditions::mark_false(
                self.conditions_mut(),
                HETZNER_API_REACHABLE,
                RATE_LIMIT_EXCEEDED_REASON,
                ConditionSeverity::Warning,
                err.to_string(),
            );
            self.record_warning(RATE_LIMIT_EXCEEDED_REASON, err.to_string());
        }
        err
    }
}
