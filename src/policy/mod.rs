//! Policy Interface - a decision function over state → action
//!
//! Two conforming implementations ship with the engine:
//! - `LinearQPolicy`: learned value-based policy, selects the action
//!   maximizing a learned linear value estimate
//! - `SafetyFallbackPolicy`: deterministic, always routes to the most
//!   conservative action consistent with the top-1 predicted severity
//!
//! The interface is stable: swapping implementations requires no change to
//! the decision arbiter or the MDP environment.

mod linear_q;
mod safety;
mod training;

pub use linear_q::LinearQPolicy;
pub use safety::SafetyFallbackPolicy;
pub use training::{train_policy, TrainingReport};

use crate::types::ResourceAction;
use thiserror::Error;

/// Errors from a trained policy. The arbiter absorbs these by falling back
/// to the deterministic safety policy, which never fails.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy unavailable: {0}")]
    Unavailable(String),
    #[error("state vector has length {got}, policy expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A decision function over the composed state vector.
pub trait Policy: Send + Sync {
    /// Select a resource action for the given state.
    fn select_action(&self, state: &[f64]) -> Result<ResourceAction, PolicyError>;

    /// Human-readable identifier for logs.
    fn name(&self) -> &'static str;
}
