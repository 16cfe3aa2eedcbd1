//! ED Shift Simulation
//!
//! Drives synthetic patient arrivals through the full hybrid engine:
//! heuristic scorer, confidence gate, policy delegation, priority queue,
//! and event stream. Reports the arbitration split and severity mix at the
//! end of the run.
//!
//! # Usage
//! ```bash
//! ./shift-sim --patients 100 --seed 42
//! ./shift-sim --weights policy_weights.json
//! ```

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rand::prelude::*;
use rand_distr::Normal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triage_engine::{
    config, ArrivalMode, DecisionSource, EngineConfig, LinearQPolicy, PatientSignal,
    ResourceAction, Severity, TriageEngineBuilder, Vitals,
};

// ============================================================================
// Arrival mix
// ============================================================================

/// Fraction of arrivals per underlying acuity (ESI 1..5).
const ACUITY_MIX: [f64; 5] = [0.03, 0.12, 0.35, 0.35, 0.15];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "shift-sim")]
#[command(about = "Synthetic ED shift through the hybrid triage engine")]
#[command(version)]
struct Args {
    /// Number of patient arrivals to simulate
    #[arg(short, long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=10_000))]
    patients: u32,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Trained policy weights (JSON); safety fallback when omitted
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Engine config TOML (defaults to the standard search order)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dispatch the head of the queue after every N arrivals
    #[arg(long, default_value = "3")]
    dispatch_every: u32,
}

// ============================================================================
// Synthetic patients
// ============================================================================

struct Archetype {
    complaint: &'static str,
    heart_rate: (f64, f64),
    systolic_bp: (f64, f64),
    respiratory_rate: (f64, f64),
    o2_saturation: (f64, f64),
    pain_score: f64,
    ems_probability: f64,
}

/// One representative presentation per acuity band.
fn archetype_for(acuity: u8) -> Archetype {
    match acuity {
        1 => Archetype {
            complaint: "unresponsive, agonal breathing",
            heart_rate: (135.0, 12.0),
            systolic_bp: (75.0, 8.0),
            respiratory_rate: (28.0, 3.0),
            o2_saturation: (82.0, 4.0),
            pain_score: 9.0,
            ems_probability: 0.95,
        },
        2 => Archetype {
            complaint: "crushing chest pain radiating to left arm",
            heart_rate: (112.0, 10.0),
            systolic_bp: (100.0, 10.0),
            respiratory_rate: (22.0, 2.0),
            o2_saturation: (92.0, 2.0),
            pain_score: 8.0,
            ems_probability: 0.55,
        },
        3 => Archetype {
            complaint: "abdominal pain since yesterday",
            heart_rate: (95.0, 8.0),
            systolic_bp: (125.0, 10.0),
            respiratory_rate: (18.0, 2.0),
            o2_saturation: (97.0, 1.0),
            pain_score: 6.0,
            ems_probability: 0.10,
        },
        4 => Archetype {
            complaint: "twisted ankle playing soccer",
            heart_rate: (82.0, 6.0),
            systolic_bp: (128.0, 8.0),
            respiratory_rate: (16.0, 1.5),
            o2_saturation: (98.0, 1.0),
            pain_score: 4.0,
            ems_probability: 0.02,
        },
        _ => Archetype {
            complaint: "medication refill",
            heart_rate: (75.0, 5.0),
            systolic_bp: (130.0, 8.0),
            respiratory_rate: (14.0, 1.0),
            o2_saturation: (99.0, 0.5),
            pain_score: 1.0,
            ems_probability: 0.01,
        },
    }
}

fn sample_acuity(rng: &mut StdRng) -> u8 {
    let draw: f64 = rng.gen();
    let mut acc = 0.0;
    for (i, share) in ACUITY_MIX.iter().enumerate() {
        acc += share;
        if draw < acc {
            return i as u8 + 1;
        }
    }
    5
}

fn generate_signal(rng: &mut StdRng, index: u32) -> (PatientSignal, u8) {
    let acuity = sample_acuity(rng);
    let a = archetype_for(acuity);
    let sample = |rng: &mut StdRng, (mean, sd): (f64, f64)| {
        Normal::new(mean, sd).map(|n| n.sample(rng)).unwrap_or(mean)
    };

    // A tenth of arrivals come in with an incomplete vitals panel.
    let temperature = if rng.gen::<f64>() < 0.1 {
        None
    } else {
        Some(sample(rng, (98.4, 0.8)))
    };

    let vitals = Vitals {
        heart_rate: Some(sample(rng, a.heart_rate)),
        systolic_bp: Some(sample(rng, a.systolic_bp)),
        diastolic_bp: Some(sample(rng, (78.0, 8.0))),
        respiratory_rate: Some(sample(rng, a.respiratory_rate)),
        o2_saturation: Some(sample(rng, a.o2_saturation).min(100.0)),
        temperature,
        pain_score: Some(a.pain_score),
    };
    let arrival_mode = if rng.gen::<f64>() < a.ems_probability {
        ArrivalMode::Ems
    } else {
        ArrivalMode::WalkIn
    };

    let signal = PatientSignal {
        patient_id: format!("SIM-{index:04}"),
        chief_complaint: a.complaint.to_string(),
        complaint_vector: vec![],
        vitals,
        arrival_mode,
        arrival_time: Utc::now(),
    };
    (signal, acuity)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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

    let mut builder = TriageEngineBuilder::from_global();
    if let Some(path) = &args.weights {
        let policy = LinearQPolicy::load(path)
            .with_context(|| format!("loading policy weights from {}", path.display()))?;
        builder = builder.policy(Arc::new(policy));
    }
    let engine = builder.build();

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);
    info!(patients = args.patients, seed, "Shift simulation starting");

    let mut policy_decisions = 0u32;
    let mut supervised_decisions = 0u32;
    let mut critical_hits = 0u32;
    let mut critical_total = 0u32;
    let mut over_triaged = 0u32;
    let mut low_acuity_total = 0u32;
    let mut severity_counts = [0u32; 5];
    let mut confidence_sum = 0.0;
    let mut confidence_n = 0u32;
    let mut dispatched = 0u32;

    for i in 0..args.patients {
        let (signal, true_acuity) = generate_signal(&mut rng, i);
        let decision = engine.submit(signal).await?;

        match decision.source {
            DecisionSource::Policy => policy_decisions += 1,
            DecisionSource::Supervised => supervised_decisions += 1,
        }
        severity_counts[(decision.severity.level() - 1) as usize] += 1;
        if let Some(c) = decision.confidence {
            confidence_sum += c;
            confidence_n += 1;
        }
        if true_acuity <= 2 {
            critical_total += 1;
            if decision.severity.is_critical() || decision.action.occupies_resource() {
                critical_hits += 1;
            }
        }
        if true_acuity >= 4 {
            low_acuity_total += 1;
            if decision.action == ResourceAction::CriticalBed {
                over_triaged += 1;
            }
        }

        if args.dispatch_every > 0 && (i + 1) % args.dispatch_every == 0 {
            if let Some(entry) = engine.pop_next() {
                dispatched += 1;
                // Immediate bed turnover keeps capacity realistic over a
                // long run without modeling length of stay here.
                engine.release(entry.decision.action);
            }
        }
    }

    let total = args.patients as f64;
    info!("Shift simulation complete");
    info!(
        supervised = supervised_decisions,
        policy = policy_decisions,
        policy_share = %format!("{:.1}%", policy_decisions as f64 / total * 100.0),
        "Arbitration split"
    );
    for (i, count) in severity_counts.iter().enumerate() {
        if let Some(sev) = Severity::from_prob_index(i) {
            info!(severity = %sev, count, "Assigned severity");
        }
    }
    if critical_total > 0 {
        info!(
            escalated = critical_hits,
            arrived = critical_total,
            miss_rate = %format!(
                "{:.1}%",
                (critical_total - critical_hits) as f64 / critical_total as f64 * 100.0
            ),
            "Critical arrivals (true ESI 1-2)"
        );
    }
    if low_acuity_total > 0 {
        info!(
            over_triaged,
            arrived = low_acuity_total,
            rate = %format!("{:.1}%", over_triaged as f64 / low_acuity_total as f64 * 100.0),
            "Over-triage (true ESI 4-5 to critical bed)"
        );
    }
    if confidence_n > 0 {
        info!(
            mean = %format!("{:.3}", confidence_sum / confidence_n as f64),
            "Classifier confidence"
        );
    }
    info!(
        dispatched,
        pending = engine.pending_count(),
        "Queue at end of shift"
    );

    Ok(())
}
