//! Deterministic safety-fallback policy
//!
//! The last line of defense: used when no trained policy is available, or
//! when the trained policy fails. Routes to the most conservative resource
//! action consistent with the top-1 predicted severity. Must never fail.

use super::{Policy, PolicyError};
use crate::env::probs_from_state;
use crate::types::{ResourceAction, Severity};

/// Always-available conservative policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyFallbackPolicy;

impl SafetyFallbackPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Most conservative action for a predicted severity. ESI 3 maps to an
    /// acute bed rather than fast track: when in doubt, escalate.
    pub fn action_for_level(severity: Severity) -> ResourceAction {
        match severity {
            Severity::Immediate => ResourceAction::CriticalBed,
            Severity::Emergent | Severity::Urgent => ResourceAction::AcuteBed,
            Severity::LessUrgent => ResourceAction::FastTrack,
            Severity::NonUrgent => ResourceAction::WaitingRoom,
        }
    }
}

impl Policy for SafetyFallbackPolicy {
    fn select_action(&self, state: &[f64]) -> Result<ResourceAction, PolicyError> {
        let probs = probs_from_state(state);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        // An all-zero prefix (scoring unavailable) arg-maxes to index 0;
        // treat that as the grey zone, not as ESI 1.
        let severity = if probs.iter().all(|p| *p == 0.0) {
            Severity::Urgent
        } else {
            Severity::from_prob_index(best).unwrap_or(Severity::Urgent)
        };
        Ok(Self::action_for_level(severity))
    }

    fn name(&self) -> &'static str {
        "safety-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::build_state;
    use crate::types::OperationalState;

    fn state_for(probs: [f64; 5]) -> Vec<f64> {
        build_state(&probs, 0.5, &[], &OperationalState::default(), 10)
    }

    #[test]
    fn test_conservative_mapping() {
        let policy = SafetyFallbackPolicy::new();
        let action = policy
            .select_action(&state_for([0.9, 0.05, 0.03, 0.01, 0.01]))
            .unwrap();
        assert_eq!(action, ResourceAction::CriticalBed);

        let action = policy
            .select_action(&state_for([0.0, 0.1, 0.8, 0.1, 0.0]))
            .unwrap();
        assert_eq!(action, ResourceAction::AcuteBed);

        let action = policy
            .select_action(&state_for([0.0, 0.0, 0.1, 0.1, 0.8]))
            .unwrap();
        assert_eq!(action, ResourceAction::WaitingRoom);
    }

    #[test]
    fn test_zero_probs_escalate_to_acute() {
        let policy = SafetyFallbackPolicy::new();
        let action = policy.select_action(&state_for([0.0; 5])).unwrap();
        assert_eq!(action, ResourceAction::AcuteBed);
    }
}
