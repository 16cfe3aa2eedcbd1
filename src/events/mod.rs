//! Event Broker - live decision and state-change events for subscribers
//!
//! Publish/subscribe channel feeding dashboards and notification transports.
//! Each subscriber gets its own ordered, append-only sequence of events in
//! publish order; there is no cross-subscriber ordering guarantee.
//!
//! Buffering policy: **unbounded per-subscriber channels**. `publish` never
//! blocks on a slow consumer; a disconnected subscriber is pruned on the
//! next publish. Memory is bounded by subscriber consumption, which the
//! transport layer owns.

use crate::types::{DecisionSource, RationaleFeature, ResourceAction, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

// ============================================================================
// Events
// ============================================================================

/// Why a patient left the queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Dispatched to a resource via `pop`
    Dispatched,
    /// Manually withdrawn (discharged or left without being seen)
    Withdrawn,
}

/// Decision and queue lifecycle events. A closed set of tagged variants with
/// a fixed payload shape per tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriageEvent {
    /// A decision was emitted and the patient admitted to the queue
    NewPatient {
        patient_id: String,
        severity: Severity,
        action: ResourceAction,
        source: DecisionSource,
        priority_score: f64,
        enqueued_at: DateTime<Utc>,
    },
    /// An existing entry's decision was superseded (re-triage, or delayed
    /// rationale data became available)
    DecisionUpdated {
        patient_id: String,
        severity: Severity,
        action: ResourceAction,
        priority_score: f64,
        rationale: Option<Vec<RationaleFeature>>,
    },
    /// The patient left the queue
    PatientRemoved {
        patient_id: String,
        reason: RemovalReason,
    },
}

impl TriageEvent {
    /// Patient the event concerns.
    pub fn patient_id(&self) -> &str {
        match self {
            TriageEvent::NewPatient { patient_id, .. }
            | TriageEvent::DecisionUpdated { patient_id, .. }
            | TriageEvent::PatientRemoved { patient_id, .. } => patient_id,
        }
    }
}

// ============================================================================
// Broker
// ============================================================================

/// A live, ordered sequence of events scoped to one subscriber.
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<TriageEvent>,
}

impl EventSubscription {
    /// Next event in publish order, or `None` once the broker is dropped.
    pub async fn recv(&mut self) -> Option<TriageEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant for polling consumers.
    pub fn try_recv(&mut self) -> Option<TriageEvent> {
        self.rx.try_recv().ok()
    }
}

/// Publish/subscribe broker with per-subscriber ordered delivery.
#[derive(Default)]
pub struct EventBroker {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TriageEvent>>>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscriber list is a plain Vec of senders; a poisoned lock is
    /// recovered, never allowed to mute the broker.
    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<TriageEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        EventSubscription { rx }
    }

    /// Append an event to every active subscriber's delivery sequence.
    /// Never blocks; closed subscribers are dropped here.
    pub fn publish(&self, event: &TriageEvent) {
        let mut subs = self.lock();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(
            patient_id = %event.patient_id(),
            subscribers = subs.len(),
            "Event published"
        );
    }

    /// Active subscriber count (after pruning on last publish).
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(id: &str) -> TriageEvent {
        TriageEvent::PatientRemoved {
            patient_id: id.to_string(),
            reason: RemovalReason::Withdrawn,
        }
    }

    #[tokio::test]
    async fn test_subscriber_sees_events_in_publish_order() {
        let broker = EventBroker::new();
        let mut sub = broker.subscribe();
        broker.publish(&removed("A"));
        broker.publish(&removed("B"));
        assert_eq!(sub.recv().await.unwrap().patient_id(), "A");
        assert_eq!(sub.recv().await.unwrap().patient_id(), "B");
    }

    #[tokio::test]
    async fn test_publish_does_not_block_on_dropped_subscriber() {
        let broker = EventBroker::new();
        let sub = broker.subscribe();
        drop(sub);
        broker.publish(&removed("A"));
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_every_event() {
        let broker = EventBroker::new();
        let mut a = broker.subscribe();
        let mut b = broker.subscribe();
        broker.publish(&removed("X"));
        assert_eq!(a.recv().await.unwrap().patient_id(), "X");
        assert_eq!(b.recv().await.unwrap().patient_id(), "X");
    }

    #[tokio::test]
    async fn test_broker_recovers_from_poisoned_lock() {
        let broker = std::sync::Arc::new(EventBroker::new());
        let held = broker.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.subscribers.lock().unwrap();
            panic!("poison the subscriber lock");
        })
        .join();

        let mut sub = broker.subscribe();
        broker.publish(&removed("A"));
        assert_eq!(sub.recv().await.unwrap().patient_id(), "A");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_string(&removed("P9")).unwrap();
        assert!(json.contains("\"event\":\"patient_removed\""));
        assert!(json.contains("\"patient_id\":\"P9\""));
    }
}
