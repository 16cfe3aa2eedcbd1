//! Decision Arbiter - confidence-gated arbitration between classifier and policy
//!
//! The arbiter owns the core hybrid rule: trust the supervised classifier
//! when it is confident and outside the grey zone, delegate to the
//! sequential-decision policy otherwise.
//!
//! ## Gate Conditions (any one delegates to the policy)
//!
//! - Scoring unavailable (scorer error or timeout)
//! - Classifier confidence below the configured threshold
//! - Top-1 prediction lands in the grey zone (ESI 3 by default), where
//!   routing depends on current department load rather than acuity alone
//!
//! Gate parameters are runtime-tunable through [`GateHandle`] without
//! restarting the engine; in-flight decisions see a consistent snapshot.

use crate::config::GateSection;
use crate::env::build_state;
use crate::policy::{Policy, SafetyFallbackPolicy};
use crate::scorer::ScoreResult;
use crate::types::{
    Decision, DecisionSource, OperationalState, RationaleFeature, ResourceAction, Severity,
};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Gate configuration
// ============================================================================

/// Arbitration gate boundary. Small and `Copy` so every decision reads a
/// consistent snapshot even while an operator retunes the live values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Below this classifier confidence, delegate to the policy
    pub confidence_threshold: f64,
    /// ESI level treated as the grey zone (always delegated)
    pub grey_zone_level: u8,
}

impl From<GateSection> for GateConfig {
    fn from(section: GateSection) -> Self {
        Self {
            confidence_threshold: section.confidence_threshold,
            grey_zone_level: section.grey_zone_level,
        }
    }
}

/// Shared, hot-swappable gate configuration. Clones are cheap and all
/// observe the same underlying values.
#[derive(Debug, Clone)]
pub struct GateHandle {
    inner: Arc<ArcSwap<GateConfig>>,
}

impl GateHandle {
    pub fn new(config: GateConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Current gate values.
    pub fn snapshot(&self) -> GateConfig {
        **self.inner.load()
    }

    /// Replace the gate values. Takes effect for subsequent decisions;
    /// decisions already in flight keep the snapshot they read.
    pub fn replace(&self, config: GateConfig) {
        info!(
            confidence_threshold = config.confidence_threshold,
            grey_zone_level = config.grey_zone_level,
            "Gate configuration updated"
        );
        self.inner.store(Arc::new(config));
    }
}

// ============================================================================
// Arbiter
// ============================================================================

/// Why a decision was delegated to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelegationReason {
    ScoreUnavailable,
    LowConfidence,
    GreyZone,
}

impl DelegationReason {
    fn as_str(self) -> &'static str {
        match self {
            DelegationReason::ScoreUnavailable => "score_unavailable",
            DelegationReason::LowConfidence => "low_confidence",
            DelegationReason::GreyZone => "grey_zone",
        }
    }
}

/// Arbitrates each patient between the supervised classifier and the
/// sequential-decision policy, producing the final [`Decision`].
pub struct DecisionArbiter {
    gate: GateHandle,
    policy: Arc<dyn Policy>,
    safety: SafetyFallbackPolicy,
    embedding_dim: usize,
}

impl DecisionArbiter {
    pub fn new(gate: GateHandle, policy: Arc<dyn Policy>, embedding_dim: usize) -> Self {
        Self {
            gate,
            policy,
            safety: SafetyFallbackPolicy::new(),
            embedding_dim,
        }
    }

    /// Handle for live gate retuning.
    pub fn gate(&self) -> &GateHandle {
        &self.gate
    }

    /// Produce the final decision for one patient.
    ///
    /// `score` is `None` when the scorer failed or timed out; that path
    /// always delegates, and the safety fallback guarantees an action.
    pub fn decide(
        &self,
        patient_id: &str,
        arrival_time: DateTime<Utc>,
        score: Option<&ScoreResult>,
        rationale: Option<Vec<RationaleFeature>>,
        ops: &OperationalState,
        now: DateTime<Utc>,
    ) -> Decision {
        let gate = self.gate.snapshot();

        let delegation = match score {
            None => Some(DelegationReason::ScoreUnavailable),
            Some(result) => {
                if result.confidence < gate.confidence_threshold {
                    Some(DelegationReason::LowConfidence)
                } else if result.top_level().level() == gate.grey_zone_level {
                    Some(DelegationReason::GreyZone)
                } else {
                    None
                }
            }
        };

        let (severity, action, source) = if let (None, Some(result)) = (delegation, score) {
            let severity = result.top_level();
            (
                severity,
                SafetyFallbackPolicy::action_for_level(severity),
                DecisionSource::Supervised,
            )
        } else {
            let reason = delegation.unwrap_or(DelegationReason::ScoreUnavailable);
            let action = self.delegate(score, ops, reason);
            (severity_for_action(action), action, DecisionSource::Policy)
        };

        let confidence = score.map(|r| r.confidence);
        let decision = Decision {
            patient_id: patient_id.to_string(),
            severity,
            action,
            source,
            priority_score: priority_score(severity, arrival_time),
            confidence,
            rationale,
            arrival_time,
            decided_at: now,
        };

        info!(
            patient_id,
            severity = %decision.severity,
            action = %decision.action,
            source = %decision.source,
            confidence = ?confidence,
            "Triage decision"
        );
        decision
    }

    fn delegate(
        &self,
        score: Option<&ScoreResult>,
        ops: &OperationalState,
        reason: DelegationReason,
    ) -> ResourceAction {
        let (probs, confidence, embedding): ([f64; 5], f64, &[f64]) = match score {
            Some(r) => (r.class_probabilities, r.confidence, &r.embedding),
            None => ([0.0; 5], 0.0, &[]),
        };
        let state = build_state(&probs, confidence, embedding, ops, self.embedding_dim);

        match self.policy.select_action(&state) {
            Ok(action) => {
                info!(
                    policy = self.policy.name(),
                    reason = reason.as_str(),
                    action = %action,
                    "Delegated to policy"
                );
                action
            }
            Err(e) => {
                warn!(
                    policy = self.policy.name(),
                    error = %e,
                    "Policy failed, using safety fallback"
                );
                // The safety policy is total over all states
                self.safety
                    .select_action(&state)
                    .unwrap_or(ResourceAction::AcuteBed)
            }
        }
    }
}

/// Severity implied by a policy-chosen action. The policy selects resources,
/// not ESI levels, so the recorded severity is derived from the action's
/// intensity.
pub fn severity_for_action(action: ResourceAction) -> Severity {
    match action {
        ResourceAction::CriticalBed => Severity::Immediate,
        ResourceAction::AcuteBed => Severity::Emergent,
        ResourceAction::AdvancedDiagnostics => Severity::Urgent,
        ResourceAction::FastTrack => Severity::LessUrgent,
        ResourceAction::WaitingRoom => Severity::NonUrgent,
    }
}

/// Informational priority encoding: severity dominates, earlier arrival wins
/// within a level. The queue orders on its own key; this score travels with
/// the decision for dashboards and event consumers.
pub fn priority_score(severity: Severity, arrival_time: DateTime<Utc>) -> f64 {
    let minutes = arrival_time.timestamp() as f64 / 60.0;
    (6 - severity.level()) as f64 * 100_000.0 - minutes
}
