//! State-space composition from heterogeneous signals
//!
//! One fixed-length numeric vector consumed by every policy implementation:
//!
//! ```text
//! [class_probabilities(5), confidence(1), embedding(k),
//!  num_waiting, num_critical_free, num_acute_free, num_fast_track_free,
//!  avg_wait_time, sin(hour), cos(hour), day_of_week]
//! ```
//!
//! The layout is a contract shared by training and production inference;
//! changing it invalidates every saved policy.

use crate::scorer::NUM_CLASSES;
use crate::types::OperationalState;

/// Operational features appended after probabilities + confidence + embedding.
pub const OPERATIONAL_FEATURES: usize = 8;

/// Total state vector length for a given embedding dimension.
pub fn state_dim(embedding_dim: usize) -> usize {
    NUM_CLASSES + 1 + embedding_dim + OPERATIONAL_FEATURES
}

/// Offset of the class-probability block (always the vector prefix).
pub const PROBS_OFFSET: usize = 0;

/// Compose the state vector. The embedding is zero-padded or truncated to
/// `embedding_dim` so the vector length is stable across scorers.
pub fn build_state(
    class_probabilities: &[f64; NUM_CLASSES],
    confidence: f64,
    embedding: &[f64],
    ops: &OperationalState,
    embedding_dim: usize,
) -> Vec<f64> {
    let mut state = Vec::with_capacity(state_dim(embedding_dim));
    state.extend_from_slice(class_probabilities);
    state.push(confidence);
    for i in 0..embedding_dim {
        state.push(embedding.get(i).copied().unwrap_or(0.0));
    }
    let hour_angle = ops.hour_of_day / 24.0 * std::f64::consts::TAU;
    state.push(f64::from(ops.num_waiting));
    state.push(f64::from(ops.critical_free));
    state.push(f64::from(ops.acute_free));
    state.push(f64::from(ops.fast_track_free));
    state.push(ops.avg_wait_minutes);
    state.push(hour_angle.sin());
    state.push(hour_angle.cos());
    state.push(f64::from(ops.day_of_week));
    state
}

/// Read the class-probability prefix back out of a state vector.
/// Used by the safety fallback policy, which acts on top-1 severity only.
pub fn probs_from_state(state: &[f64]) -> [f64; NUM_CLASSES] {
    let mut probs = [0.0; NUM_CLASSES];
    for (i, p) in probs.iter_mut().enumerate() {
        *p = state.get(PROBS_OFFSET + i).copied().unwrap_or(0.0);
    }
    probs
}
