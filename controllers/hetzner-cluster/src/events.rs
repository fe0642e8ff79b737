//! Kubernetes Event recording.
//!
//! Services record events on the [`ClusterScope`](crate::scope::ClusterScope)
//! while they run; the reconciler publishes them once the pass is over.
//! Publishing is fire-and-forget: a failed event is logged and never fails
//! reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Reporting component shown on every event
pub const REPORTER: &str = "hetzner-cluster-controller";

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// Event recorded during a reconcile, not yet published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub reason: String,
    pub note: String,
}

/// Publishes events on a Kubernetes object.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event; failures are logged, not returned
    async fn publish(&self, resource_ref: &ObjectReference, event: &RecordedEvent);
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: REPORTER.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, event: &RecordedEvent) {
        let type_ = match event.kind {
            EventKind::Normal => EventType::Normal,
            EventKind::Warning => EventType::Warning,
        };
        let kube_event = Event {
            type_,
            reason: event.reason.clone(),
            note: Some(event.note.clone()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, resource_ref).await {
            warn!(reason = %event.reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}
