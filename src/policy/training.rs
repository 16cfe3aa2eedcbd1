//! Q-learning trainer over the shift environment
//!
//! Epsilon-greedy temporal-difference learning with linear function
//! approximation. One episode = one simulated shift; epsilon decays over
//! the configured exploration fraction, then stays at its floor.

use super::linear_q::LinearQPolicy;
use crate::config::{CapacitySection, RewardSection, ScorerSection, ShiftSection, TrainingSection};
use crate::env::{state_dim, ShiftEnv};
use crate::types::{ResourceAction, ACTIONS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

/// Per-run training summary.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub episodes: usize,
    pub total_steps: usize,
    pub first_episode_reward: f64,
    pub last_episode_reward: f64,
    pub mean_reward_last_10: f64,
}

fn epsilon_for(episode: usize, params: &TrainingSection) -> f64 {
    let decay_span = (params.episodes as f64 * params.exploration_fraction).max(1.0);
    let progress = (episode as f64 / decay_span).min(1.0);
    params.epsilon_start + (params.epsilon_final - params.epsilon_start) * progress
}

/// Train a linear Q policy against synthetic shifts. Each episode reseeds
/// the environment so the policy sees varied arrival patterns.
pub fn train_policy(
    shift: ShiftSection,
    rewards: RewardSection,
    capacity: CapacitySection,
    scorer: ScorerSection,
    params: TrainingSection,
    seed: u64,
) -> (LinearQPolicy, TrainingReport) {
    let dim = state_dim(scorer.embedding_dim);
    let mut policy = LinearQPolicy::zeros(dim);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut total_steps = 0usize;
    let mut first_episode_reward = 0.0;
    let mut last_episode_reward = 0.0;
    let mut recent: Vec<f64> = Vec::new();

    for episode in 0..params.episodes {
        let epsilon = epsilon_for(episode, &params);
        let mut env = ShiftEnv::new(shift, rewards, capacity, scorer, seed.wrapping_add(episode as u64));
        let mut state = env.reset();
        let mut episode_reward = 0.0;

        loop {
            let action = if rng.gen::<f64>() < epsilon {
                ACTIONS[rng.gen_range(0..ACTIONS.len())]
            } else {
                greedy(&policy, &state)
            };

            let out = env.step(action);
            episode_reward += out.reward;
            total_steps += 1;

            let target = if out.done {
                out.reward
            } else {
                let next_q = policy.q_values(&out.state);
                out.reward + params.gamma * next_q.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            };
            let td_error = target - policy.q_value(&state, action.index());
            policy.update(&state, action.index(), td_error, params.learning_rate);

            state = out.state;
            if out.done {
                break;
            }
        }

        if episode == 0 {
            first_episode_reward = episode_reward;
        }
        last_episode_reward = episode_reward;
        recent.push(episode_reward);
        if recent.len() > 10 {
            recent.remove(0);
        }

        if (episode + 1) % 20 == 0 || episode + 1 == params.episodes {
            info!(
                episode = episode + 1,
                reward = %format!("{episode_reward:.1}"),
                epsilon = %format!("{epsilon:.3}"),
                "Training progress"
            );
        }
    }

    let mean_recent = if recent.is_empty() {
        0.0
    } else {
        recent.iter().sum::<f64>() / recent.len() as f64
    };

    let report = TrainingReport {
        episodes: params.episodes,
        total_steps,
        first_episode_reward,
        last_episode_reward,
        mean_reward_last_10: mean_recent,
    };
    (policy, report)
}

fn greedy(policy: &LinearQPolicy, state: &[f64]) -> ResourceAction {
    let q = policy.q_values(state);
    let mut best = 0;
    for (i, v) in q.iter().enumerate() {
        if *v > q[best] {
            best = i;
        }
    }
    ResourceAction::from_index(best).unwrap_or(ResourceAction::AcuteBed)
}
