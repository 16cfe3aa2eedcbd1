//! Shared data structures for the hybrid triage decision pipeline
//!
//! This module defines the core types flowing through the engine:
//! - `PatientSignal`: per-patient snapshot from the feature-extraction layer
//! - `Severity` / `ResourceAction` / `DecisionSource`: the decision vocabulary
//! - `Decision`: the engine's per-patient output
//! - `OperationalState`: point-in-time ED occupancy snapshot

mod patient;
mod decision;
mod state;

pub use patient::*;
pub use decision::*;
pub use state::*;
