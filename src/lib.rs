//! Triage Engine: Hybrid Emergency-Department Decision Intelligence
//!
//! Routes ED patients to a severity level and a resource action, deciding
//! per patient whether to trust a fast supervised classifier or defer to a
//! more conservative sequential-decision policy.
//!
//! ## Architecture
//!
//! - **Scorer Adapter**: normalizes any classifier/embedding model into a
//!   fixed `ScoreResult` contract
//! - **Decision Arbiter**: confidence/grey-zone gate between the supervised
//!   result and the policy
//! - **MDP Environment**: one simulated 24-hour shift, consumed identically
//!   by the training loop and trace-based evaluation
//! - **Priority Queue**: severity-then-arrival total order, owns the
//!   operational state
//! - **Event Broker**: per-subscriber ordered live event sequences

pub mod config;
pub mod types;
pub mod scorer;
pub mod env;
pub mod policy;
pub mod arbiter;
pub mod queue;
pub mod events;
pub mod engine;

// Re-export engine configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    ArrivalMode, Decision, DecisionSource, OperationalState, PatientSignal,
    RationaleFeature, ResourceAction, Severity, Vitals,
};

// Re-export component seams
pub use arbiter::{DecisionArbiter, GateConfig, GateHandle};
pub use engine::{AuditSink, SubmitError, TriageEngine, TriageEngineBuilder};
pub use events::{EventBroker, EventSubscription, RemovalReason, TriageEvent};
pub use policy::{LinearQPolicy, Policy, PolicyError, SafetyFallbackPolicy};
pub use queue::{QueueEntry, QueueError, TriageQueue};
pub use scorer::{HeuristicScorer, ScoreError, ScoreResult, Scorer};
