//! Engine Configuration - deployment-tunable values as TOML
//!
//! Every boundary the arbitration gate depends on (confidence threshold,
//! grey-zone level), plus capacities, reward weights, and training
//! hyperparameters. Each struct implements `Default` with values matching
//! the reference deployment, so behavior is unchanged when no config file
//! is present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one engine deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$TRIAGE_CONFIG` env var
/// 2. `./triage_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Arbitration gate boundary (confidence threshold, grey zone)
    #[serde(default)]
    pub gate: GateSection,

    /// Bed and slot capacities
    #[serde(default)]
    pub capacity: CapacitySection,

    /// Scorer adapter tuning
    #[serde(default)]
    pub scorer: ScorerSection,

    /// Shift simulation parameters (MDP environment)
    #[serde(default)]
    pub shift: ShiftSection,

    /// Reward shaping weights
    #[serde(default)]
    pub rewards: RewardSection,

    /// Policy training hyperparameters
    #[serde(default)]
    pub training: TrainingSection,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TRIAGE_CONFIG` environment variable
    /// 2. `./triage_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("TRIAGE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from TRIAGE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from TRIAGE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "TRIAGE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("triage_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./triage_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./triage_config.toml, using defaults");
                }
            }
        }

        info!("No triage_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gate cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.gate.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "gate.confidence_threshold must be in [0, 1], got {}",
                self.gate.confidence_threshold
            )));
        }
        if !(1..=5).contains(&self.gate.grey_zone_level) {
            return Err(ConfigError::Invalid(format!(
                "gate.grey_zone_level must be in 1..=5, got {}",
                self.gate.grey_zone_level
            )));
        }
        if self.scorer.embedding_dim > 4096 {
            return Err(ConfigError::Invalid(format!(
                "scorer.embedding_dim unreasonably large: {}",
                self.scorer.embedding_dim
            )));
        }
        if !self.shift.arrivals_per_hour.is_finite() || self.shift.arrivals_per_hour <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "shift.arrivals_per_hour must be positive, got {}",
                self.shift.arrivals_per_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.shift.deterioration_per_hour) {
            return Err(ConfigError::Invalid(format!(
                "shift.deterioration_per_hour must be in [0, 1], got {}",
                self.shift.deterioration_per_hour
            )));
        }
        if !self.shift.mean_los_minutes.is_finite() || self.shift.mean_los_minutes <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "shift.mean_los_minutes must be positive, got {}",
                self.shift.mean_los_minutes
            )));
        }
        if !self.shift.diagnostics_los_saving_minutes.is_finite()
            || self.shift.diagnostics_los_saving_minutes < 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "shift.diagnostics_los_saving_minutes must be non-negative, got {}",
                self.shift.diagnostics_los_saving_minutes
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Arbitration gate boundary. These two values define the conditions under
/// which the supervised classifier is not trusted; they must stay a superset
/// of the conditions under which it is empirically unreliable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateSection {
    /// Below this classifier confidence, delegate to the policy
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Predicted ESI level that always delegates (the grey zone)
    #[serde(default = "default_grey_zone_level")]
    pub grey_zone_level: u8,
    /// Scorer call budget before falling back to the policy (milliseconds)
    #[serde(default = "default_score_timeout_ms")]
    pub score_timeout_ms: u64,
}

fn default_confidence_threshold() -> f64 {
    0.60
}
fn default_grey_zone_level() -> u8 {
    3
}
fn default_score_timeout_ms() -> u64 {
    250
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            grey_zone_level: default_grey_zone_level(),
            score_timeout_ms: default_score_timeout_ms(),
        }
    }
}

/// Department capacities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacitySection {
    #[serde(default = "default_critical_beds")]
    pub critical_beds: u32,
    #[serde(default = "default_acute_beds")]
    pub acute_beds: u32,
    #[serde(default = "default_fast_track_slots")]
    pub fast_track_slots: u32,
}

fn default_critical_beds() -> u32 {
    3
}
fn default_acute_beds() -> u32 {
    10
}
fn default_fast_track_slots() -> u32 {
    5
}

impl Default for CapacitySection {
    fn default() -> Self {
        Self {
            critical_beds: default_critical_beds(),
            acute_beds: default_acute_beds(),
            fast_track_slots: default_fast_track_slots(),
        }
    }
}

/// Scorer adapter tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScorerSection {
    /// Fixed embedding length the state builder pads/truncates to
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_embedding_dim() -> usize {
    10
}

impl Default for ScorerSection {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// Shift simulation parameters for the MDP environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShiftSection {
    /// Mean patient arrivals per hour (Poisson)
    #[serde(default = "default_arrivals_per_hour")]
    pub arrivals_per_hour: f64,
    /// Per-hour probability that a queued critical patient deteriorates
    #[serde(default = "default_deterioration_per_hour")]
    pub deterioration_per_hour: f64,
    /// Mean length of stay in an acute bed (minutes)
    #[serde(default = "default_mean_los_minutes")]
    pub mean_los_minutes: f64,
    /// Mean time advanced diagnostics shaves off length of stay (minutes)
    #[serde(default = "default_diagnostics_los_saving")]
    pub diagnostics_los_saving_minutes: f64,
}

fn default_arrivals_per_hour() -> f64 {
    8.0
}
fn default_deterioration_per_hour() -> f64 {
    0.05
}
fn default_mean_los_minutes() -> f64 {
    180.0
}
fn default_diagnostics_los_saving() -> f64 {
    30.0
}

impl Default for ShiftSection {
    fn default() -> Self {
        Self {
            arrivals_per_hour: default_arrivals_per_hour(),
            deterioration_per_hour: default_deterioration_per_hour(),
            mean_los_minutes: default_mean_los_minutes(),
            diagnostics_los_saving_minutes: default_diagnostics_los_saving(),
        }
    }
}

/// Reward shaping weights for the MDP environment.
///
/// Signs are part of the contract: penalties are negative, bonuses positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardSection {
    /// Severity 1-2 routed to waiting room or fast track (critical miss)
    #[serde(default = "default_under_triage_penalty")]
    pub under_triage: f64,
    /// A queued patient's condition flagged as deteriorated
    #[serde(default = "default_deterioration_penalty")]
    pub deterioration: f64,
    /// Per patient-minute waited, applied each step
    #[serde(default = "default_wait_per_minute")]
    pub wait_per_minute: f64,
    /// Per patient successfully discharged
    #[serde(default = "default_discharge_bonus")]
    pub discharge: f64,
    /// Severity 4-5 routed to a critical bed (over-triage)
    #[serde(default = "default_over_triage_penalty")]
    pub over_triage: f64,
    /// Advanced diagnostics order; refunded when it shortens length of stay
    #[serde(default = "default_diagnostics_cost")]
    pub diagnostics: f64,
}

fn default_under_triage_penalty() -> f64 {
    -100.0
}
fn default_deterioration_penalty() -> f64 {
    -200.0
}
fn default_wait_per_minute() -> f64 {
    -0.1
}
fn default_discharge_bonus() -> f64 {
    10.0
}
fn default_over_triage_penalty() -> f64 {
    -10.0
}
fn default_diagnostics_cost() -> f64 {
    -5.0
}

impl Default for RewardSection {
    fn default() -> Self {
        Self {
            under_triage: default_under_triage_penalty(),
            deterioration: default_deterioration_penalty(),
            wait_per_minute: default_wait_per_minute(),
            discharge: default_discharge_bonus(),
            over_triage: default_over_triage_penalty(),
            diagnostics: default_diagnostics_cost(),
        }
    }
}

/// Q-learning hyperparameters for the policy trainer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingSection {
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,
    #[serde(default = "default_epsilon_final")]
    pub epsilon_final: f64,
    /// Fraction of episodes over which epsilon decays
    #[serde(default = "default_exploration_fraction")]
    pub exploration_fraction: f64,
}

fn default_episodes() -> usize {
    200
}
fn default_learning_rate() -> f64 {
    1e-3
}
fn default_gamma() -> f64 {
    0.99
}
fn default_epsilon_start() -> f64 {
    1.0
}
fn default_epsilon_final() -> f64 {
    0.02
}
fn default_exploration_fraction() -> f64 {
    0.1
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            learning_rate: default_learning_rate(),
            gamma: default_gamma(),
            epsilon_start: default_epsilon_start(),
            epsilon_final: default_epsilon_final(),
            exploration_fraction: default_exploration_fraction(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let cfg = EngineConfig::default();
        assert!((cfg.gate.confidence_threshold - 0.60).abs() < 1e-12);
        assert_eq!(cfg.gate.grey_zone_level, 3);
        assert_eq!(cfg.capacity.acute_beds, 10);
        assert!((cfg.rewards.under_triage - -100.0).abs() < 1e-12);
        assert!((cfg.rewards.deterioration - -200.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [gate]
            confidence_threshold = 0.75
            "#,
        )
        .unwrap();
        assert!((cfg.gate.confidence_threshold - 0.75).abs() < 1e-12);
        assert_eq!(cfg.gate.grey_zone_level, 3);
        assert_eq!(cfg.scorer.embedding_dim, 10);
    }

    #[test]
    fn test_validate_rejects_bad_gate() {
        let mut cfg = EngineConfig::default();
        cfg.gate.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());
        cfg.gate.confidence_threshold = 0.6;
        cfg.gate.grey_zone_level = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_shift_section() {
        let mut cfg = EngineConfig::default();
        cfg.shift.deterioration_per_hour = -0.05;
        assert!(cfg.validate().is_err());

        cfg.shift.deterioration_per_hour = 0.05;
        cfg.shift.arrivals_per_hour = 0.0;
        assert!(cfg.validate().is_err());

        cfg.shift.arrivals_per_hour = 8.0;
        cfg.shift.mean_los_minutes = f64::NAN;
        assert!(cfg.validate().is_err());

        cfg.shift.mean_los_minutes = 180.0;
        cfg.shift.diagnostics_los_saving_minutes = -1.0;
        assert!(cfg.validate().is_err());

        cfg.shift.diagnostics_los_saving_minutes = 30.0;
        assert!(cfg.validate().is_ok());
    }
}
