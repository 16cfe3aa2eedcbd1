//! Policy Trainer
//!
//! Trains the linear Q policy against synthetic 24-hour shifts, evaluates
//! it greedily against the deterministic safety baseline, and writes the
//! weights to a JSON artifact that `shift-sim` and production inference can
//! load.
//!
//! # Usage
//! ```bash
//! ./train-policy --episodes 500 --out policy_weights.json
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triage_engine::policy::{train_policy, Policy, SafetyFallbackPolicy};
use triage_engine::{config, env::ShiftEnv, EngineConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "train-policy")]
#[command(about = "Train the triage resource-allocation policy on synthetic shifts")]
#[command(version)]
struct Args {
    /// Training episodes (overrides the config value)
    #[arg(short, long)]
    episodes: Option<usize>,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output path for the trained weights
    #[arg(short, long, default_value = "policy_weights.json")]
    out: PathBuf,

    /// Greedy evaluation episodes after training
    #[arg(long, default_value = "5")]
    eval_episodes: u64,

    /// Engine config TOML (defaults to the standard search order)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Run one full shift greedily under `policy`, returning the episode reward.
fn run_episode(cfg: &EngineConfig, policy: &dyn Policy, seed: u64) -> f64 {
    let mut env = ShiftEnv::new(cfg.shift, cfg.rewards, cfg.capacity, cfg.scorer, seed);
    let mut state = env.reset();
    let mut total = 0.0;
    let safety = SafetyFallbackPolicy::new();

    loop {
        let action = policy
            .select_action(&state)
            .or_else(|_| safety.select_action(&state))
            .unwrap_or(triage_engine::ResourceAction::AcuteBed);
        let out = env.step(action);
        total += out.reward;
        state = out.state;
        if out.done {
            return total;
        }
    }
}

fn mean_eval(cfg: &EngineConfig, policy: &dyn Policy, episodes: u64, seed_base: u64) -> f64 {
    if episodes == 0 {
        return 0.0;
    }
    let total: f64 = (0..episodes)
        .map(|i| run_episode(cfg, policy, seed_base.wrapping_add(i)))
        .sum();
    total / episodes as f64
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    config::init(cfg);
    let cfg = config::get();

    let mut params = cfg.training;
    if let Some(episodes) = args.episodes {
        params.episodes = episodes;
    }
    info!(
        episodes = params.episodes,
        learning_rate = params.learning_rate,
        gamma = params.gamma,
        seed = args.seed,
        "Training starting"
    );

    let (policy, report) = train_policy(
        cfg.shift,
        cfg.rewards,
        cfg.capacity,
        cfg.scorer,
        params,
        args.seed,
    );
    info!(
        total_steps = report.total_steps,
        first_episode = %format!("{:.1}", report.first_episode_reward),
        last_episode = %format!("{:.1}", report.last_episode_reward),
        mean_last_10 = %format!("{:.1}", report.mean_reward_last_10),
        "Training complete"
    );

    // Held-out seeds the trainer never saw.
    let eval_base = args.seed.wrapping_add(1_000_000);
    let trained_mean = mean_eval(cfg, &policy, args.eval_episodes, eval_base);
    let baseline_mean = mean_eval(cfg, &SafetyFallbackPolicy::new(), args.eval_episodes, eval_base);
    info!(
        trained = %format!("{trained_mean:.1}"),
        safety_baseline = %format!("{baseline_mean:.1}"),
        episodes = args.eval_episodes,
        "Greedy evaluation (mean episode reward)"
    );

    policy
        .save(&args.out)
        .with_context(|| format!("writing weights to {}", args.out.display()))?;
    info!(path = %args.out.display(), "Policy weights saved");

    Ok(())
}
