//! MDP Environment - one simulated emergency-department shift
//!
//! The environment the policy is trained and evaluated against. An episode
//! is one 24-hour shift; a step is either a new arrival or a resource
//! becoming free. `reset()` reinitializes the department to empty and
//! returns the initial state vector; `step(action)` applies the action to
//! the addressed patient, advances simulated time to the next decision
//! point, and returns `(next_state, reward, done, info)`.
//!
//! Two drive modes share an identical state/action/reward contract:
//! - synthetic arrivals (seeded Poisson process) for policy learning
//! - trace replay of recorded shifts for evaluation

mod state_builder;
mod shift;

pub use shift::{ArrivalRecord, ShiftEnv, StepInfo, StepOutcome};
pub use state_builder::{build_state, probs_from_state, state_dim, OPERATIONAL_FEATURES};
