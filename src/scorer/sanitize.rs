//! Vitals sanitization: median imputation and valid-range clamping
//!
//! Intake vitals are frequently missing, zeroed by monitor glitches, or
//! keyed with impossible values. Models must never see those raw. Medians
//! come from the NHAMCS reference dataset.

use crate::types::Vitals;

/// NHAMCS median vitals used for imputation.
pub const MEDIAN_HEART_RATE: f64 = 82.0;
pub const MEDIAN_RESPIRATORY_RATE: f64 = 18.0;
pub const MEDIAN_SYSTOLIC_BP: f64 = 130.0;
pub const MEDIAN_DIASTOLIC_BP: f64 = 78.0;
pub const MEDIAN_O2_SATURATION: f64 = 98.0;
pub const MEDIAN_TEMPERATURE_F: f64 = 98.2;
pub const MEDIAN_PAIN_SCORE: f64 = 5.0;

/// Valid physiological ranges; out-of-range values are clamped.
const RANGE_HEART_RATE: (f64, f64) = (20.0, 250.0);
const RANGE_RESPIRATORY_RATE: (f64, f64) = (4.0, 60.0);
const RANGE_SYSTOLIC_BP: (f64, f64) = (40.0, 300.0);
const RANGE_DIASTOLIC_BP: (f64, f64) = (20.0, 200.0);
const RANGE_O2_SATURATION: (f64, f64) = (50.0, 100.0);
const RANGE_TEMPERATURE_F: (f64, f64) = (86.0, 113.0);
const RANGE_PAIN_SCORE: (f64, f64) = (0.0, 10.0);

/// Fully-imputed vitals, safe to feed to a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SanitizedVitals {
    pub heart_rate: f64,
    pub respiratory_rate: f64,
    pub systolic_bp: f64,
    pub diastolic_bp: f64,
    pub o2_saturation: f64,
    pub temperature: f64,
    pub pain_score: f64,
}

/// Sanitize one vital: missing, negative, or (for circulatory vitals)
/// zero values fall back to the median; the rest is clamped into range.
fn sanitize_one(value: Option<f64>, median: f64, range: (f64, f64), zero_is_missing: bool) -> f64 {
    match value {
        None => median,
        Some(v) if !v.is_finite() || v < 0.0 => median,
        Some(v) if v == 0.0 && zero_is_missing => median,
        Some(v) => v.clamp(range.0, range.1),
    }
}

/// Sanitize and impute a full vitals snapshot.
///
/// - Missing values → median imputation
/// - Out-of-range values → clamped to the valid range
/// - Negative values → treated as missing
/// - Zero circulatory/respiratory readings → treated as missing
pub fn sanitize_vitals(vitals: &Vitals) -> SanitizedVitals {
    SanitizedVitals {
        heart_rate: sanitize_one(vitals.heart_rate, MEDIAN_HEART_RATE, RANGE_HEART_RATE, true),
        respiratory_rate: sanitize_one(
            vitals.respiratory_rate,
            MEDIAN_RESPIRATORY_RATE,
            RANGE_RESPIRATORY_RATE,
            true,
        ),
        systolic_bp: sanitize_one(vitals.systolic_bp, MEDIAN_SYSTOLIC_BP, RANGE_SYSTOLIC_BP, true),
        diastolic_bp: sanitize_one(
            vitals.diastolic_bp,
            MEDIAN_DIASTOLIC_BP,
            RANGE_DIASTOLIC_BP,
            true,
        ),
        o2_saturation: sanitize_one(
            vitals.o2_saturation,
            MEDIAN_O2_SATURATION,
            RANGE_O2_SATURATION,
            true,
        ),
        temperature: sanitize_one(
            vitals.temperature,
            MEDIAN_TEMPERATURE_F,
            RANGE_TEMPERATURE_F,
            false,
        ),
        // Pain score of zero is a legitimate report, not a missing value
        pain_score: sanitize_one(vitals.pain_score, MEDIAN_PAIN_SCORE, RANGE_PAIN_SCORE, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vitals_imputed_with_medians() {
        let s = sanitize_vitals(&Vitals::default());
        assert!((s.heart_rate - MEDIAN_HEART_RATE).abs() < 1e-12);
        assert!((s.o2_saturation - MEDIAN_O2_SATURATION).abs() < 1e-12);
        assert!((s.temperature - MEDIAN_TEMPERATURE_F).abs() < 1e-12);
    }

    #[test]
    fn test_zero_circulatory_vitals_treated_as_missing() {
        let vitals = Vitals {
            heart_rate: Some(0.0),
            pain_score: Some(0.0),
            ..Vitals::default()
        };
        let s = sanitize_vitals(&vitals);
        assert!((s.heart_rate - MEDIAN_HEART_RATE).abs() < 1e-12);
        // Zero pain is a real report
        assert!((s.pain_score - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let vitals = Vitals {
            heart_rate: Some(900.0),
            o2_saturation: Some(20.0),
            ..Vitals::default()
        };
        let s = sanitize_vitals(&vitals);
        assert!((s.heart_rate - 250.0).abs() < 1e-12);
        assert!((s.o2_saturation - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_values_treated_as_missing() {
        let vitals = Vitals {
            systolic_bp: Some(-5.0),
            ..Vitals::default()
        };
        let s = sanitize_vitals(&vitals);
        assert!((s.systolic_bp - MEDIAN_SYSTOLIC_BP).abs() < 1e-12);
    }
}
