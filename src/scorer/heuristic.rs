//! Deterministic vitals-driven scorer
//!
//! A dependency-free `Scorer` implementation used by the shift simulator and
//! as a stand-in when no trained classifier is deployed. It maps instability
//! indicators (hypoxia, hypotension, shock index, tachycardia, tachypnea,
//! fever, pain, EMS arrival) onto a continuous acuity estimate and spreads
//! probability mass around it. Deterministic: identical input, identical
//! output.

use super::sanitize::{sanitize_vitals, SanitizedVitals};
use super::{ScoreError, ScoreResult, Scorer, NUM_CLASSES};
use crate::types::{ArrivalMode, PatientSignal, RationaleFeature};
use async_trait::async_trait;

/// Gaussian spread of probability mass around the acuity estimate.
const LEVEL_SPREAD: f64 = 0.65;

/// One triggered instability indicator and its weight.
struct Indicator {
    name: &'static str,
    weight: f64,
}

/// Deterministic vitals-driven scorer.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    embedding_dim: usize,
}

impl HeuristicScorer {
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    /// Collect triggered indicators, heaviest first.
    fn indicators(vitals: &SanitizedVitals, arrival: ArrivalMode) -> Vec<Indicator> {
        let mut out = Vec::new();
        if vitals.o2_saturation < 90.0 {
            out.push(Indicator { name: "O2Sat", weight: 1.6 });
        }
        if vitals.systolic_bp < 90.0 {
            out.push(Indicator { name: "SBP", weight: 1.5 });
        }
        let shock_index = vitals.heart_rate / vitals.systolic_bp;
        if shock_index >= 1.0 {
            out.push(Indicator { name: "ShockIndex", weight: 1.2 });
        }
        if vitals.heart_rate > 120.0 {
            out.push(Indicator { name: "HR", weight: 0.8 });
        }
        if vitals.respiratory_rate > 24.0 {
            out.push(Indicator { name: "Resp", weight: 0.8 });
        }
        if vitals.temperature > 103.0 {
            out.push(Indicator { name: "Temp", weight: 0.5 });
        }
        if vitals.pain_score >= 8.0 {
            out.push(Indicator { name: "PainScale", weight: 0.3 });
        }
        if arrival == ArrivalMode::Ems {
            out.push(Indicator { name: "ArrivalMode", weight: 0.3 });
        }
        out.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        out
    }

    /// Continuous acuity estimate in [1, 5]; lower is more severe.
    fn acuity_estimate(vitals: &SanitizedVitals, arrival: ArrivalMode) -> f64 {
        let burden: f64 = Self::indicators(vitals, arrival).iter().map(|i| i.weight).sum();
        (4.6 - burden * 1.1).clamp(1.0, 5.0)
    }

    /// Spread probability mass around the acuity estimate.
    fn probabilities(estimate: f64) -> [f64; NUM_CLASSES] {
        let mut probs = [0.0; NUM_CLASSES];
        let mut sum = 0.0;
        for (i, p) in probs.iter_mut().enumerate() {
            let level = (i + 1) as f64;
            let d = (level - estimate) / LEVEL_SPREAD;
            *p = (-0.5 * d * d).exp();
            sum += *p;
        }
        for p in &mut probs {
            *p /= sum;
        }
        probs
    }

    /// Deterministic embedding: normalized sanitized vitals, cycled to the
    /// configured length.
    fn embedding(&self, vitals: &SanitizedVitals) -> Vec<f64> {
        let base = [
            vitals.heart_rate / 250.0,
            vitals.respiratory_rate / 60.0,
            vitals.systolic_bp / 300.0,
            vitals.diastolic_bp / 200.0,
            vitals.o2_saturation / 100.0,
            (vitals.temperature - 86.0) / 27.0,
            vitals.pain_score / 10.0,
        ];
        (0..self.embedding_dim).map(|i| base[i % base.len()]).collect()
    }
}

#[async_trait]
impl Scorer for HeuristicScorer {
    async fn score(&self, signal: &PatientSignal) -> Result<ScoreResult, ScoreError> {
        let vitals = sanitize_vitals(&signal.vitals);
        let estimate = Self::acuity_estimate(&vitals, signal.arrival_mode);
        ScoreResult::new(Self::probabilities(estimate), self.embedding(&vitals))
    }

    fn explain(
        &self,
        signal: &PatientSignal,
        _score: &ScoreResult,
    ) -> Option<Vec<RationaleFeature>> {
        let vitals = sanitize_vitals(&signal.vitals);
        let indicators = Self::indicators(&vitals, signal.arrival_mode);
        if indicators.is_empty() {
            return None;
        }
        Some(
            indicators
                .into_iter()
                .take(3)
                .map(|i| RationaleFeature {
                    feature: i.name.to_string(),
                    impact: i.weight,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vitals;
    use chrono::Utc;

    fn signal(vitals: Vitals, arrival: ArrivalMode) -> PatientSignal {
        PatientSignal {
            patient_id: "P-1".to_string(),
            chief_complaint: "test".to_string(),
            complaint_vector: vec![],
            vitals,
            arrival_mode: arrival,
            arrival_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unstable_vitals_score_severe() {
        let scorer = HeuristicScorer::new(10);
        let vitals = Vitals {
            heart_rate: Some(135.0),
            systolic_bp: Some(78.0),
            o2_saturation: Some(84.0),
            respiratory_rate: Some(30.0),
            ..Vitals::default()
        };
        let score = scorer.score(&signal(vitals, ArrivalMode::Ems)).await.unwrap();
        assert!(score.top_level().is_critical());
        assert_eq!(score.embedding.len(), 10);
    }

    #[tokio::test]
    async fn test_normal_vitals_score_low_acuity() {
        let scorer = HeuristicScorer::new(10);
        let score = scorer
            .score(&signal(Vitals::default(), ArrivalMode::WalkIn))
            .await
            .unwrap();
        assert!(score.top_level().level() >= 4);
    }

    #[tokio::test]
    async fn test_deterministic_for_identical_input() {
        let scorer = HeuristicScorer::new(10);
        let s = signal(Vitals { heart_rate: Some(110.0), ..Vitals::default() }, ArrivalMode::WalkIn);
        let a = scorer.score(&s).await.unwrap();
        let b = scorer.score(&s).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_explain_names_triggered_indicators() {
        let scorer = HeuristicScorer::new(10);
        let vitals = Vitals {
            o2_saturation: Some(85.0),
            systolic_bp: Some(80.0),
            ..Vitals::default()
        };
        let s = signal(vitals, ArrivalMode::WalkIn);
        let score = scorer.score(&s).await.unwrap();
        let rationale = scorer.explain(&s, &score).unwrap();
        assert_eq!(rationale[0].feature, "O2Sat");
    }
}
