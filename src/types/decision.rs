//! Decision vocabulary: Severity, ResourceAction, DecisionSource, Decision

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Severity (Emergency Severity Index)
// ============================================================================

/// Emergency Severity Index level, 1 (most critical) to 5 (least urgent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// ESI 1 — immediate life-saving intervention required
    Immediate,
    /// ESI 2 — high-risk, should not wait
    Emergent,
    /// ESI 3 — stable, multiple resources expected
    Urgent,
    /// ESI 4 — one resource expected
    LessUrgent,
    /// ESI 5 — no resources expected
    NonUrgent,
}

impl Severity {
    /// Numeric ESI level (1-5).
    pub fn level(self) -> u8 {
        match self {
            Severity::Immediate => 1,
            Severity::Emergent => 2,
            Severity::Urgent => 3,
            Severity::LessUrgent => 4,
            Severity::NonUrgent => 5,
        }
    }

    /// Parse from a numeric ESI level (1-5).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Severity::Immediate),
            2 => Some(Severity::Emergent),
            3 => Some(Severity::Urgent),
            4 => Some(Severity::LessUrgent),
            5 => Some(Severity::NonUrgent),
            _ => None,
        }
    }

    /// From a class-probability index (0 = ESI 1, most severe first).
    pub fn from_prob_index(index: usize) -> Option<Self> {
        Self::from_level(index as u8 + 1)
    }

    /// Short code for logging
    pub fn short_code(self) -> &'static str {
        match self {
            Severity::Immediate => "ESI-1",
            Severity::Emergent => "ESI-2",
            Severity::Urgent => "ESI-3",
            Severity::LessUrgent => "ESI-4",
            Severity::NonUrgent => "ESI-5",
        }
    }

    /// ESI 1-2: an under-triage of this patient is a critical miss.
    pub fn is_critical(self) -> bool {
        matches!(self, Severity::Immediate | Severity::Emergent)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_code())
    }
}

// ============================================================================
// Resource Actions
// ============================================================================

/// Resource routing actions. Index order matches the policy's action
/// encoding (0 = WaitingRoom .. 4 = AdvancedDiagnostics).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceAction {
    /// Hold in the waiting room
    WaitingRoom,
    /// Route to the fast-track area
    FastTrack,
    /// Assign an acute-care bed
    AcuteBed,
    /// Assign a critical-care bed
    CriticalBed,
    /// Order advanced diagnostics before placement
    AdvancedDiagnostics,
}

/// All actions in policy index order.
pub const ACTIONS: [ResourceAction; 5] = [
    ResourceAction::WaitingRoom,
    ResourceAction::FastTrack,
    ResourceAction::AcuteBed,
    ResourceAction::CriticalBed,
    ResourceAction::AdvancedDiagnostics,
];

impl ResourceAction {
    /// Policy action index (0-4).
    pub fn index(self) -> usize {
        match self {
            ResourceAction::WaitingRoom => 0,
            ResourceAction::FastTrack => 1,
            ResourceAction::AcuteBed => 2,
            ResourceAction::CriticalBed => 3,
            ResourceAction::AdvancedDiagnostics => 4,
        }
    }

    /// From a policy action index.
    pub fn from_index(index: usize) -> Option<Self> {
        ACTIONS.get(index).copied()
    }

    /// Get display name for logs and dashboards
    pub fn display_name(self) -> &'static str {
        match self {
            ResourceAction::WaitingRoom => "Waiting Room",
            ResourceAction::FastTrack => "Fast Track",
            ResourceAction::AcuteBed => "Acute Bed",
            ResourceAction::CriticalBed => "Critical Bed",
            ResourceAction::AdvancedDiagnostics => "Advanced Diagnostics",
        }
    }

    /// True for actions that occupy a bed or slot when dispatched.
    pub fn occupies_resource(self) -> bool {
        !matches!(self, ResourceAction::WaitingRoom)
    }
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Which component produced the final action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DecisionSource {
    /// Supervised classifier output used directly
    Supervised,
    /// Delegated to the sequential-decision policy
    Policy,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionSource::Supervised => write!(f, "SUPERVISED"),
            DecisionSource::Policy => write!(f, "POLICY"),
        }
    }
}

/// One contributing feature in a decision rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RationaleFeature {
    /// Feature name (e.g. "O2Sat", "ShockIndex")
    pub feature: String,
    /// Signed impact on the decision (larger magnitude = more influence)
    pub impact: f64,
}

/// The engine's output per patient. Created once per decision cycle,
/// immutable after creation; superseded (not mutated) on re-triage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    /// Patient this decision addresses
    pub patient_id: String,
    /// Assigned severity level
    pub severity: Severity,
    /// Resource routing action
    pub action: ResourceAction,
    /// Component that produced the final action
    pub source: DecisionSource,
    /// Queue-ordering score (monotonically decreasing in severity,
    /// FIFO within equal severity)
    pub priority_score: f64,
    /// Classifier confidence, when scoring succeeded
    pub confidence: Option<f64>,
    /// Top contributing features (may arrive after the decision is emitted)
    pub rationale: Option<Vec<RationaleFeature>>,
    /// Patient arrival timestamp (tie-break input for priority)
    pub arrival_time: DateTime<Utc>,
    /// Decision timestamp
    pub decided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_level_round_trip() {
        for level in 1..=5u8 {
            let sev = Severity::from_level(level).unwrap();
            assert_eq!(sev.level(), level);
        }
        assert!(Severity::from_level(0).is_none());
        assert!(Severity::from_level(6).is_none());
    }

    #[test]
    fn test_severity_orders_most_critical_first() {
        assert!(Severity::Immediate < Severity::Emergent);
        assert!(Severity::Emergent < Severity::Urgent);
        assert!(Severity::LessUrgent < Severity::NonUrgent);
    }

    #[test]
    fn test_action_index_round_trip() {
        for (i, action) in ACTIONS.iter().enumerate() {
            assert_eq!(action.index(), i);
            assert_eq!(ResourceAction::from_index(i), Some(*action));
        }
        assert!(ResourceAction::from_index(5).is_none());
    }
}
