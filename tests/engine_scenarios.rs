//! End-to-end decision scenarios through the public engine API
//!
//! Builds the engine with stub scorers so the gate inputs are exact, then
//! checks the arbitration outcome, queue order, and event stream a consumer
//! would observe.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use triage_engine::scorer::{ScoreError, ScoreResult, Scorer};
use triage_engine::{
    config, ArrivalMode, DecisionSource, EngineConfig, PatientSignal, RationaleFeature,
    RemovalReason, ResourceAction, Severity, TriageEngine, TriageEngineBuilder, TriageEvent,
    Vitals,
};

fn ensure_config() {
    if !config::is_initialized() {
        config::init(EngineConfig::default());
    }
}

// ============================================================================
// Stub scorers
// ============================================================================

/// Returns the same result for every patient.
struct FixedScorer(ScoreResult);

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, _signal: &PatientSignal) -> Result<ScoreResult, ScoreError> {
        Ok(self.0.clone())
    }
}

/// Never answers within any reasonable timeout.
struct StalledScorer;

#[async_trait]
impl Scorer for StalledScorer {
    async fn score(&self, _signal: &PatientSignal) -> Result<ScoreResult, ScoreError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(ScoreError::Unavailable("unreachable".to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// A score whose arg-max is `level` with exactly `confidence` probability
/// mass on it.
fn score_for(level: u8, confidence: f64) -> ScoreResult {
    let mut probs = [(1.0 - confidence) / 4.0; 5];
    probs[(level - 1) as usize] = confidence;
    ScoreResult::new(probs, vec![0.1; 10]).expect("valid probabilities")
}

fn engine_with(scorer: Arc<dyn Scorer>) -> TriageEngine {
    ensure_config();
    TriageEngineBuilder::new(EngineConfig::default())
        .scorer(scorer)
        .build()
}

fn signal(id: &str) -> PatientSignal {
    PatientSignal {
        patient_id: id.to_string(),
        chief_complaint: "test presentation".to_string(),
        complaint_vector: vec![],
        vitals: Vitals::default(),
        arrival_mode: ArrivalMode::WalkIn,
        arrival_time: Utc::now(),
    }
}

// ============================================================================
// Gate scenarios
// ============================================================================

#[tokio::test]
async fn test_confident_critical_stays_supervised() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(1, 0.92))));
    let mut unstable = signal("P-1");
    unstable.vitals = Vitals {
        heart_rate: Some(120.0),
        systolic_bp: Some(85.0),
        o2_saturation: Some(91.0),
        ..Vitals::default()
    };
    let decision = engine.submit(unstable).await.unwrap();

    assert_eq!(decision.source, DecisionSource::Supervised);
    assert_eq!(decision.severity, Severity::Immediate);
    assert_eq!(decision.action, ResourceAction::CriticalBed);
    assert_eq!(decision.confidence, Some(0.92));
}

#[tokio::test]
async fn test_gate_is_deterministic_for_identical_inputs() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(2, 0.85))));
    let first = engine.submit(signal("P-1")).await.unwrap();
    let second = engine.submit(signal("P-1")).await.unwrap();

    assert_eq!(first.severity, second.severity);
    assert_eq!(first.action, second.action);
    assert_eq!(first.source, second.source);
}

#[tokio::test]
async fn test_low_confidence_delegates_to_policy() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(4, 0.40))));
    let decision = engine.submit(signal("P-1")).await.unwrap();

    assert_eq!(decision.source, DecisionSource::Policy);
    assert_eq!(decision.confidence, Some(0.40));
}

#[tokio::test]
async fn test_grey_zone_delegates_despite_high_confidence() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(3, 0.95))));
    let decision = engine.submit(signal("P-1")).await.unwrap();

    assert_eq!(decision.source, DecisionSource::Policy);
}

#[tokio::test]
async fn test_scorer_timeout_still_yields_decision() {
    ensure_config();
    let cfg = EngineConfig {
        gate: triage_engine::config::GateSection {
            score_timeout_ms: 30,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = TriageEngineBuilder::new(cfg)
        .scorer(Arc::new(StalledScorer))
        .build();

    let decision = engine.submit(signal("P-1")).await.unwrap();
    assert_eq!(decision.source, DecisionSource::Policy);
    assert_eq!(decision.confidence, None);
    // The safety fallback escalates unscored patients rather than parking
    // them in the waiting room.
    assert_eq!(decision.action, ResourceAction::AcuteBed);
    assert_eq!(engine.pending_count(), 1);
}

#[tokio::test]
async fn test_supervised_decisions_respect_gate_invariant() {
    let cases = [
        (1u8, 0.92),
        (2, 0.75),
        (3, 0.95),
        (4, 0.40),
        (4, 0.61),
        (5, 0.59),
        (5, 0.88),
    ];
    for (level, confidence) in cases {
        let engine = engine_with(Arc::new(FixedScorer(score_for(level, confidence))));
        let decision = engine.submit(signal("P-1")).await.unwrap();
        if decision.source == DecisionSource::Supervised {
            assert!(decision.confidence.unwrap() >= 0.60);
            assert_ne!(decision.severity, Severity::Urgent);
        }
    }
}

// ============================================================================
// Queue and lifecycle
// ============================================================================

#[tokio::test]
async fn test_dispatch_order_is_severity_then_arrival() {
    ensure_config();

    // One shared queue, acuity keyed on the patient id.
    struct ByIdScorer;
    #[async_trait]
    impl Scorer for ByIdScorer {
        async fn score(&self, signal: &PatientSignal) -> Result<ScoreResult, ScoreError> {
            let level = match signal.patient_id.as_str() {
                "critical" => 1,
                "emergent" => 2,
                _ => 5,
            };
            Ok(score_for(level, 0.90))
        }
    }

    let engine = TriageEngineBuilder::new(EngineConfig::default())
        .scorer(Arc::new(ByIdScorer))
        .build();

    engine.submit(signal("routine")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine.submit(signal("emergent")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine.submit(signal("critical")).await.unwrap();

    assert_eq!(engine.pop_next().unwrap().decision.patient_id, "critical");
    assert_eq!(engine.pop_next().unwrap().decision.patient_id, "emergent");
    assert_eq!(engine.pop_next().unwrap().decision.patient_id, "routine");
    assert!(engine.pop_next().is_none());
}

#[tokio::test]
async fn test_event_stream_covers_patient_lifecycle() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(2, 0.85))));
    let mut sub = engine.subscribe();

    engine.submit(signal("P-1")).await.unwrap();
    engine
        .attach_rationale(
            "P-1",
            vec![RationaleFeature {
                feature: "ShockIndex".to_string(),
                impact: 0.7,
            }],
        )
        .unwrap();
    engine.pop_next().unwrap();

    match sub.recv().await.unwrap() {
        TriageEvent::NewPatient {
            patient_id, source, ..
        } => {
            assert_eq!(patient_id, "P-1");
            assert_eq!(source, DecisionSource::Supervised);
        }
        other => panic!("expected NewPatient, got {other:?}"),
    }
    match sub.recv().await.unwrap() {
        TriageEvent::DecisionUpdated { rationale, .. } => {
            assert_eq!(rationale.unwrap()[0].feature, "ShockIndex");
        }
        other => panic!("expected DecisionUpdated, got {other:?}"),
    }
    match sub.recv().await.unwrap() {
        TriageEvent::PatientRemoved { reason, .. } => {
            assert_eq!(reason, RemovalReason::Dispatched);
        }
        other => panic!("expected PatientRemoved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_withdraw_emits_withdrawn_reason() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(4, 0.80))));
    let mut sub = engine.subscribe();

    engine.submit(signal("P-1")).await.unwrap();
    engine.withdraw("P-1").unwrap();
    assert_eq!(engine.pending_count(), 0);

    sub.recv().await.unwrap(); // NewPatient
    match sub.recv().await.unwrap() {
        TriageEvent::PatientRemoved { reason, .. } => {
            assert_eq!(reason, RemovalReason::Withdrawn);
        }
        other => panic!("expected PatientRemoved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resubmission_supersedes_and_occupancy_tracks_dispatch() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(2, 0.85))));

    engine.submit(signal("P-1")).await.unwrap();
    engine.submit(signal("P-1")).await.unwrap();
    assert_eq!(engine.pending_count(), 1);

    let free_before = engine.operational_state().acute_free;
    let entry = engine.pop_next().unwrap();
    assert_eq!(entry.decision.action, ResourceAction::AcuteBed);
    assert_eq!(engine.operational_state().acute_free, free_before - 1);

    engine.release(entry.decision.action);
    assert_eq!(engine.operational_state().acute_free, free_before);
}

#[tokio::test]
async fn test_invalid_signal_rejected_without_side_effects() {
    let engine = engine_with(Arc::new(FixedScorer(score_for(3, 0.50))));
    let mut sub = engine.subscribe();

    let mut bad = signal("P-1");
    bad.vitals.heart_rate = Some(f64::NAN);
    assert!(engine.submit(bad).await.is_err());
    assert_eq!(engine.pending_count(), 0);
    assert!(sub.try_recv().is_none());
}
