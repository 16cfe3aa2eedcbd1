//! Scorer Adapter - normalizes any classifier/embedding model into a fixed contract
//!
//! The engine never talks to a concrete model. It talks to the `Scorer`
//! trait, which produces a `ScoreResult`: five class probabilities (most
//! severe first), the confidence scalar, and an optional embedding. Any
//! model runtime can sit behind this seam without touching the arbiter.
//!
//! A scorer call may block on external compute; callers impose a timeout
//! and treat expiry as `ScoreError::Unavailable`, routed through the normal
//! gate logic.

mod sanitize;
mod heuristic;

pub use heuristic::HeuristicScorer;
pub use sanitize::{SanitizedVitals, sanitize_vitals};

use crate::types::{PatientSignal, RationaleFeature, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of severity classes (ESI 1-5).
pub const NUM_CLASSES: usize = 5;

/// Tolerance for the probability-sum invariant.
pub const PROB_SUM_TOLERANCE: f64 = 1e-6;

/// Errors from the scorer adapter.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// The underlying model cannot produce a result (missing required
    /// inputs, model not loaded, or call timed out). Recovered locally by
    /// the arbitration gate; never surfaced to callers of `submit`.
    #[error("scoring unavailable: {0}")]
    Unavailable(String),
    /// The model produced an output violating the ScoreResult contract.
    #[error("invalid score output: {0}")]
    InvalidOutput(String),
}

/// Output of the scorer adapter. Derived, recomputed every decision cycle,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResult {
    /// Probability per severity level, index 0 = ESI 1 (most severe first).
    /// Always length 5, sums to 1 ± 1e-6.
    pub class_probabilities: [f64; NUM_CLASSES],
    /// Max class probability, in [0, 1]
    pub confidence: f64,
    /// Fixed-length numeric embedding; empty when the model has none
    pub embedding: Vec<f64>,
}

impl ScoreResult {
    /// Build a validated result. The confidence scalar is always derived
    /// from the probabilities, never supplied by the model.
    pub fn new(
        class_probabilities: [f64; NUM_CLASSES],
        embedding: Vec<f64>,
    ) -> Result<Self, ScoreError> {
        if class_probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ScoreError::InvalidOutput(
                "class probabilities must be finite and non-negative".to_string(),
            ));
        }
        let sum: f64 = class_probabilities.iter().sum();
        if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(ScoreError::InvalidOutput(format!(
                "class probabilities sum to {sum}, expected 1 ± {PROB_SUM_TOLERANCE}"
            )));
        }
        let confidence = class_probabilities.iter().fold(0.0_f64, |a, &b| a.max(b));
        Ok(Self {
            class_probabilities,
            confidence,
            embedding,
        })
    }

    /// Arg-max severity level (the supervised prediction).
    pub fn top_level(&self) -> Severity {
        let mut best = 0;
        for (i, p) in self.class_probabilities.iter().enumerate() {
            if *p > self.class_probabilities[best] {
                best = i;
            }
        }
        // best is always in 0..5, so the lookup cannot miss
        Severity::from_prob_index(best).unwrap_or(Severity::Urgent)
    }
}

/// A classifier/embedding model behind a narrow capability interface.
///
/// `score` must have no side effects beyond deterministic computation.
/// Implementations may block on external inference; the engine bounds every
/// call with the configured timeout.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Produce a `ScoreResult` for one patient, or fail with
    /// `ScoreError::Unavailable`.
    async fn score(&self, signal: &PatientSignal) -> Result<ScoreResult, ScoreError>;

    /// Optional delayed explanation: top contributing features for a result
    /// already produced. Models without attribution support return `None`.
    fn explain(
        &self,
        _signal: &PatientSignal,
        _score: &ScoreResult,
    ) -> Option<Vec<RationaleFeature>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_result_validates_sum() {
        assert!(ScoreResult::new([0.2; 5], vec![]).is_ok());
        assert!(ScoreResult::new([0.3, 0.3, 0.3, 0.3, 0.3], vec![]).is_err());
        assert!(ScoreResult::new([1.0, 0.0, 0.0, 0.0, -0.0], vec![]).is_ok());
        assert!(ScoreResult::new([1.2, -0.2, 0.0, 0.0, 0.0], vec![]).is_err());
    }

    #[test]
    fn test_confidence_is_max_probability() {
        let score = ScoreResult::new([0.1, 0.15, 0.5, 0.15, 0.1], vec![]).unwrap();
        assert!((score.confidence - 0.5).abs() < 1e-12);
        assert_eq!(score.top_level(), Severity::Urgent);
    }

    #[test]
    fn test_top_level_most_severe_first() {
        let score = ScoreResult::new([0.92, 0.04, 0.02, 0.01, 0.01], vec![]).unwrap();
        assert_eq!(score.top_level(), Severity::Immediate);
    }
}
