//! Learned value-based policy with per-action linear value estimates
//!
//! Q(s, a) = w_a · s + b_a. Selection is arg-max over the five actions.
//! Weights are produced by the trainer and serialized to JSON so the same
//! artifact loads in production inference.

use super::{Policy, PolicyError};
use crate::types::{ResourceAction, ACTIONS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Linear action-value policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearQPolicy {
    /// State vector length this policy was trained against
    pub state_dim: usize,
    /// One weight vector per action, in action index order
    pub weights: Vec<Vec<f64>>,
    /// One bias per action
    pub bias: Vec<f64>,
}

impl LinearQPolicy {
    /// Zero-initialized policy for the given state dimension.
    pub fn zeros(state_dim: usize) -> Self {
        Self {
            state_dim,
            weights: vec![vec![0.0; state_dim]; ACTIONS.len()],
            bias: vec![0.0; ACTIONS.len()],
        }
    }

    /// Action value estimate for one action index.
    pub fn q_value(&self, state: &[f64], action_idx: usize) -> f64 {
        let w = &self.weights[action_idx];
        let dot: f64 = w.iter().zip(state).map(|(wi, si)| wi * si).sum();
        dot + self.bias[action_idx]
    }

    /// All five action values.
    pub fn q_values(&self, state: &[f64]) -> [f64; 5] {
        let mut out = [0.0; 5];
        for (i, q) in out.iter_mut().enumerate() {
            *q = self.q_value(state, i);
        }
        out
    }

    /// Apply one temporal-difference update to the weights for `action_idx`.
    pub fn update(&mut self, state: &[f64], action_idx: usize, td_error: f64, alpha: f64) {
        for (wi, si) in self.weights[action_idx].iter_mut().zip(state) {
            *wi += alpha * td_error * si;
        }
        self.bias[action_idx] += alpha * td_error;
    }

    /// Serialize to JSON on disk.
    pub fn save(&self, path: &Path) -> Result<(), PolicyError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PolicyError::Unavailable(format!("serialize weights: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| PolicyError::Unavailable(format!("write {}: {e}", path.display())))
    }

    /// Load a previously saved policy.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Unavailable(format!("read {}: {e}", path.display())))?;
        let policy: Self = serde_json::from_str(&json)
            .map_err(|e| PolicyError::Unavailable(format!("parse weights: {e}")))?;
        policy.check_shape()?;
        Ok(policy)
    }

    fn check_shape(&self) -> Result<(), PolicyError> {
        if self.weights.len() != ACTIONS.len()
            || self.bias.len() != ACTIONS.len()
            || self.weights.iter().any(|w| w.len() != self.state_dim)
        {
            return Err(PolicyError::Unavailable(
                "weight shape does not match declared state_dim".to_string(),
            ));
        }
        Ok(())
    }
}

impl Policy for LinearQPolicy {
    fn select_action(&self, state: &[f64]) -> Result<ResourceAction, PolicyError> {
        if state.len() != self.state_dim {
            return Err(PolicyError::DimensionMismatch {
                expected: self.state_dim,
                got: state.len(),
            });
        }
        let q = self.q_values(state);
        let mut best = 0;
        for (i, v) in q.iter().enumerate() {
            if *v > q[best] {
                best = i;
            }
        }
        ResourceAction::from_index(best)
            .ok_or_else(|| PolicyError::Unavailable("action index out of range".to_string()))
    }

    fn name(&self) -> &'static str {
        "linear-q"
    }
}
