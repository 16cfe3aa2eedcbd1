//! Triage Engine - the facade wiring scorer, arbiter, queue, and broker
//!
//! One `submit` call runs the full decision cycle: validate the signal,
//! score it under a timeout, arbitrate, admit to the priority queue, and
//! publish the lifecycle event. Scoring failures never surface to the
//! caller; they route through the gate to the policy path so every valid
//! signal yields a decision.
//!
//! Every decision and queue transition also flows to an [`AuditSink`] for
//! after-the-fact review. The default sink writes structured log records.

use crate::arbiter::{DecisionArbiter, GateConfig, GateHandle};
use crate::config::EngineConfig;
use crate::events::{EventBroker, EventSubscription, RemovalReason, TriageEvent};
use crate::policy::{Policy, SafetyFallbackPolicy};
use crate::queue::{QueueEntry, QueueError, TriageQueue};
use crate::scorer::{HeuristicScorer, Scorer};
use crate::types::{Decision, OperationalState, PatientSignal, RationaleFeature, ResourceAction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by `submit`. Scoring and policy failures are absorbed
/// internally; only a malformed signal is rejected.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid patient signal: {0}")]
    InvalidSignal(String),
}

// ============================================================================
// Audit sink
// ============================================================================

/// What an audit record describes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Decision,
    Dispatch,
    Withdrawal,
    RationaleAttached,
}

/// One immutable audit record. Emitted after the state change it describes
/// has been committed.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub kind: AuditKind,
    pub patient_id: String,
    pub detail: String,
}

/// Receives every decision and queue transition for after-the-fact review.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Default sink: structured log records under the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            target: "audit",
            kind = ?record.kind,
            patient_id = %record.patient_id,
            detail = %record.detail,
            "Audit"
        );
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`TriageEngine`] from its collaborators. Unset parts fall
/// back to the built-in heuristic scorer, the safety policy, and the
/// tracing audit sink.
pub struct TriageEngineBuilder {
    config: EngineConfig,
    scorer: Option<Arc<dyn Scorer>>,
    policy: Option<Arc<dyn Policy>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl TriageEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scorer: None,
            policy: None,
            audit: None,
        }
    }

    /// Builder over the process-wide configuration installed by
    /// [`crate::config::init`]. Panics if `init()` has not run.
    pub fn from_global() -> Self {
        Self::new(crate::config::get().clone())
    }

    pub fn scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> TriageEngine {
        let embedding_dim = self.config.scorer.embedding_dim;
        let scorer = self
            .scorer
            .unwrap_or_else(|| Arc::new(HeuristicScorer::new(embedding_dim)));
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(SafetyFallbackPolicy::new()));
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink));

        let gate = GateHandle::new(GateConfig::from(self.config.gate));
        info!(
            confidence_threshold = self.config.gate.confidence_threshold,
            grey_zone_level = self.config.gate.grey_zone_level,
            policy = policy.name(),
            "Triage engine built"
        );

        TriageEngine {
            scorer,
            arbiter: DecisionArbiter::new(gate, policy, embedding_dim),
            queue: TriageQueue::new(self.config.capacity),
            broker: EventBroker::new(),
            audit,
            score_timeout: Duration::from_millis(self.config.gate.score_timeout_ms),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The hybrid triage decision engine.
pub struct TriageEngine {
    scorer: Arc<dyn Scorer>,
    arbiter: DecisionArbiter,
    queue: TriageQueue,
    broker: EventBroker,
    audit: Arc<dyn AuditSink>,
    score_timeout: Duration,
}

impl TriageEngine {
    /// Run the full decision cycle for one arriving patient.
    ///
    /// Never fails for scoring or policy reasons; the only error is a
    /// malformed signal rejected at the boundary.
    pub async fn submit(&self, signal: PatientSignal) -> Result<Decision, SubmitError> {
        signal.validate().map_err(SubmitError::InvalidSignal)?;
        let now = Utc::now();

        let score = match tokio::time::timeout(self.score_timeout, self.scorer.score(&signal)).await
        {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                warn!(patient_id = %signal.patient_id, error = %e, "Scoring failed");
                None
            }
            Err(_) => {
                warn!(
                    patient_id = %signal.patient_id,
                    timeout_ms = self.score_timeout.as_millis() as u64,
                    "Scoring timed out"
                );
                None
            }
        };
        let rationale = score
            .as_ref()
            .and_then(|result| self.scorer.explain(&signal, result));

        let ops = self.queue.operational_snapshot(now);
        let decision = self.arbiter.decide(
            &signal.patient_id,
            signal.arrival_time,
            score.as_ref(),
            rationale,
            &ops,
            now,
        );

        let (entry, replaced) = self.queue.admit(decision.clone(), now);
        let event = if replaced {
            TriageEvent::DecisionUpdated {
                patient_id: decision.patient_id.clone(),
                severity: decision.severity,
                action: decision.action,
                priority_score: decision.priority_score,
                rationale: decision.rationale.clone(),
            }
        } else {
            TriageEvent::NewPatient {
                patient_id: decision.patient_id.clone(),
                severity: decision.severity,
                action: decision.action,
                source: decision.source,
                priority_score: decision.priority_score,
                enqueued_at: entry.enqueued_at,
            }
        };
        self.broker.publish(&event);
        self.audit.record(&AuditRecord {
            at: now,
            kind: AuditKind::Decision,
            patient_id: decision.patient_id.clone(),
            detail: format!(
                "{} -> {} ({})",
                decision.severity, decision.action, decision.source
            ),
        });
        Ok(decision)
    }

    /// Remove and return the highest-priority patient, occupying the
    /// decision's target resource.
    pub fn pop_next(&self) -> Option<QueueEntry> {
        let entry = self.queue.pop()?;
        self.broker.publish(&TriageEvent::PatientRemoved {
            patient_id: entry.decision.patient_id.clone(),
            reason: RemovalReason::Dispatched,
        });
        self.audit.record(&AuditRecord {
            at: Utc::now(),
            kind: AuditKind::Dispatch,
            patient_id: entry.decision.patient_id.clone(),
            detail: entry.decision.action.display_name().to_string(),
        });
        Some(entry)
    }

    /// Remove a patient who left the queue without being dispatched.
    pub fn withdraw(&self, patient_id: &str) -> Result<QueueEntry, QueueError> {
        let entry = self.queue.withdraw(patient_id)?;
        self.broker.publish(&TriageEvent::PatientRemoved {
            patient_id: patient_id.to_string(),
            reason: RemovalReason::Withdrawn,
        });
        self.audit.record(&AuditRecord {
            at: Utc::now(),
            kind: AuditKind::Withdrawal,
            patient_id: patient_id.to_string(),
            detail: "withdrawn".to_string(),
        });
        Ok(entry)
    }

    /// Attach a late-arriving rationale to a live decision. The entry keeps
    /// its queue position; subscribers see a `DecisionUpdated` event.
    pub fn attach_rationale(
        &self,
        patient_id: &str,
        rationale: Vec<RationaleFeature>,
    ) -> Result<QueueEntry, QueueError> {
        let current = self
            .queue
            .get(patient_id)
            .ok_or_else(|| QueueError::UnknownPatient(patient_id.to_string()))?;
        let mut decision = current.decision;
        decision.rationale = Some(rationale);
        let entry = self.queue.reprioritize(patient_id, decision)?;

        self.broker.publish(&TriageEvent::DecisionUpdated {
            patient_id: patient_id.to_string(),
            severity: entry.decision.severity,
            action: entry.decision.action,
            priority_score: entry.decision.priority_score,
            rationale: entry.decision.rationale.clone(),
        });
        self.audit.record(&AuditRecord {
            at: Utc::now(),
            kind: AuditKind::RationaleAttached,
            patient_id: patient_id.to_string(),
            detail: format!(
                "{} features",
                entry.decision.rationale.as_ref().map_or(0, Vec::len)
            ),
        });
        Ok(entry)
    }

    /// Free the resource a dispatched action occupied (bed turnover).
    pub fn release(&self, action: ResourceAction) {
        self.queue.release(action);
    }

    /// Register a live event subscriber.
    pub fn subscribe(&self) -> EventSubscription {
        self.broker.subscribe()
    }

    /// Ordered snapshot of all pending patients.
    pub fn queue_snapshot(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    /// Current department occupancy and queue tempo.
    pub fn operational_state(&self) -> OperationalState {
        self.queue.operational_snapshot(Utc::now())
    }

    /// Handle for live gate retuning.
    pub fn gate(&self) -> &GateHandle {
        self.arbiter.gate()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArrivalMode, Vitals};

    fn engine() -> TriageEngine {
        TriageEngineBuilder::new(EngineConfig::default()).build()
    }

    fn signal(id: &str) -> PatientSignal {
        PatientSignal {
            patient_id: id.to_string(),
            chief_complaint: "chest pain".to_string(),
            complaint_vector: vec![],
            vitals: Vitals::default(),
            arrival_mode: ArrivalMode::WalkIn,
            arrival_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_patient_id() {
        let engine = engine();
        let err = engine.submit(signal("  ")).await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidSignal(_)));
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_enqueues_and_publishes() {
        let engine = engine();
        let mut sub = engine.subscribe();
        let decision = engine.submit(signal("P-1")).await.unwrap();
        assert_eq!(decision.patient_id, "P-1");
        assert_eq!(engine.pending_count(), 1);
        assert!(matches!(
            sub.recv().await.unwrap(),
            TriageEvent::NewPatient { patient_id, .. } if patient_id == "P-1"
        ));
    }

    #[tokio::test]
    async fn test_resubmit_supersedes_instead_of_duplicating() {
        let engine = engine();
        let mut sub = engine.subscribe();
        engine.submit(signal("P-1")).await.unwrap();
        engine.submit(signal("P-1")).await.unwrap();
        assert_eq!(engine.pending_count(), 1);

        sub.recv().await.unwrap();
        assert!(matches!(
            sub.recv().await.unwrap(),
            TriageEvent::DecisionUpdated { .. }
        ));
    }

    #[tokio::test]
    async fn test_attach_rationale_keeps_queue_position() {
        let engine = engine();
        engine.submit(signal("P-1")).await.unwrap();
        // Distinct enqueue timestamps so ordering is not down to the
        // same-millisecond sequence tie-break.
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.submit(signal("P-2")).await.unwrap();

        let entry = engine
            .attach_rationale(
                "P-1",
                vec![RationaleFeature {
                    feature: "ShockIndex".to_string(),
                    impact: 0.8,
                }],
            )
            .unwrap();
        assert!(entry.decision.rationale.is_some());

        // P-1 arrived first at the same severity, so it still pops first.
        let first = engine.pop_next().unwrap();
        assert_eq!(first.decision.patient_id, "P-1");
    }

    #[test]
    fn test_builder_from_global_reads_installed_config() {
        if !crate::config::is_initialized() {
            crate::config::init(EngineConfig::default());
        }
        let engine = TriageEngineBuilder::from_global().build();
        let gate = engine.gate().snapshot();
        assert_eq!(
            gate.confidence_threshold,
            crate::config::get().gate.confidence_threshold
        );
        assert_eq!(
            gate.grey_zone_level,
            crate::config::get().gate.grey_zone_level
        );
    }

    #[tokio::test]
    async fn test_withdraw_unknown_patient_errors() {
        let engine = engine();
        assert!(engine.withdraw("ghost").is_err());
    }
}
