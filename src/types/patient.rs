//! Patient intake types: PatientSignal, Vitals, ArrivalMode

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the patient arrived at the department.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum ArrivalMode {
    /// Brought in by emergency medical services
    Ems,
    /// Self-presented at the front desk
    #[default]
    WalkIn,
}

impl ArrivalMode {
    /// Numeric encoding used by the state builder.
    pub fn as_feature(self) -> f64 {
        match self {
            ArrivalMode::Ems => 1.0,
            ArrivalMode::WalkIn => 0.0,
        }
    }
}

impl std::fmt::Display for ArrivalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrivalMode::Ems => write!(f, "EMS"),
            ArrivalMode::WalkIn => write!(f, "Walk-in"),
        }
    }
}

/// Vital signs at intake. Any field may be missing; the scorer adapter
/// imputes medians before the value reaches a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vitals {
    /// Heart rate (bpm)
    pub heart_rate: Option<f64>,
    /// Respiratory rate (breaths/min)
    pub respiratory_rate: Option<f64>,
    /// Systolic blood pressure (mmHg)
    pub systolic_bp: Option<f64>,
    /// Diastolic blood pressure (mmHg)
    pub diastolic_bp: Option<f64>,
    /// Oxygen saturation (%)
    pub o2_saturation: Option<f64>,
    /// Body temperature (°F)
    pub temperature: Option<f64>,
    /// Self-reported pain score (0-10)
    pub pain_score: Option<f64>,
}

impl Vitals {
    /// Shock index (HR / SBP), a fast bedside instability indicator.
    /// `None` when either vital is missing or SBP is non-positive.
    pub fn shock_index(&self) -> Option<f64> {
        match (self.heart_rate, self.systolic_bp) {
            (Some(hr), Some(sbp)) if sbp > 0.0 => Some(hr / sbp),
            _ => None,
        }
    }
}

/// Per-patient intake snapshot. Immutable once created; owned by the
/// decision arbiter for the duration of one decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSignal {
    /// Caller-assigned patient identifier (must be non-empty)
    pub patient_id: String,
    /// Chief complaint text — opaque to the engine, passed through to events
    pub chief_complaint: String,
    /// Complaint embedding produced by the excluded feature-extraction layer
    /// (may be empty when the upstream model does not provide one)
    pub complaint_vector: Vec<f64>,
    /// Vital signs (partially missing values allowed)
    pub vitals: Vitals,
    /// Arrival mode
    pub arrival_mode: ArrivalMode,
    /// Arrival timestamp
    pub arrival_time: DateTime<Utc>,
}

impl PatientSignal {
    /// Validate the signal before it enters the arbiter.
    ///
    /// A malformed signal is rejected at the boundary, never silently
    /// defaulted: a missing identifier would make queue identity ambiguous.
    pub fn validate(&self) -> Result<(), String> {
        if self.patient_id.trim().is_empty() {
            return Err("patient_id must be non-empty".to_string());
        }
        let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
        if !(finite(self.vitals.heart_rate)
            && finite(self.vitals.respiratory_rate)
            && finite(self.vitals.systolic_bp)
            && finite(self.vitals.diastolic_bp)
            && finite(self.vitals.o2_saturation)
            && finite(self.vitals.temperature)
            && finite(self.vitals.pain_score))
        {
            return Err("vitals must be finite numbers".to_string());
        }
        if self.complaint_vector.iter().any(|v| !v.is_finite()) {
            return Err("complaint_vector must contain finite numbers".to_string());
        }
        Ok(())
    }
}
