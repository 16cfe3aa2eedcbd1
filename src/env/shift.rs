//! Event-driven shift simulation
//!
//! The department is modelled with three resource pools (critical, acute,
//! fast-track), a waiting room, and an event timeline of arrivals and
//! departures. Rewards follow the configured shaping weights: safety
//! penalties dominate, efficiency and resource terms refine.

use super::state_builder::build_state;
use crate::config::{CapacitySection, RewardSection, ScorerSection, ShiftSection};
use crate::scorer::NUM_CLASSES;
use crate::types::{OperationalState, ResourceAction, Severity};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Shift length in simulated minutes.
const SHIFT_MINUTES: f64 = 24.0 * 60.0;

/// Re-decision interval when patients wait with no departure pending.
const STALL_TICK_MINUTES: f64 = 15.0;

/// Empirical ESI mix used for synthetic arrivals (ESI 1..5).
const ACUITY_MIX: [f64; NUM_CLASSES] = [0.03, 0.12, 0.35, 0.35, 0.15];

/// One recorded (or generated) arrival: the classifier view plus ground
/// truth. Trace replay feeds these verbatim; synthetic mode samples them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub patient_id: String,
    /// Minutes after shift start
    pub arrival_minute: f64,
    /// Ground-truth acuity (drives rewards, never visible in the state)
    pub acuity: Severity,
    /// Classifier probabilities, most severe first
    pub probs: [f64; NUM_CLASSES],
    /// Classifier embedding (may be empty)
    pub embedding: Vec<f64>,
}

/// Per-step diagnostic info.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Patient now awaiting a decision (None at episode end)
    pub patient_id: Option<String>,
    /// That patient's ground-truth acuity level
    pub true_acuity: Option<u8>,
    /// Patients discharged while advancing to this decision point
    pub discharged: u32,
    /// Queued patients whose condition was flagged as deteriorated
    pub deteriorations: u32,
}

/// Result of one environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: Vec<f64>,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone)]
struct WaitingPatient {
    record: ArrivalRecord,
    deteriorated: bool,
}

#[derive(Debug, Clone)]
enum SimEvent {
    Arrival(ArrivalRecord),
    Departure {
        action: ResourceAction,
        /// Diagnostics order that measurably shortened length of stay;
        /// its cost is refunded at this departure
        diagnostics_refund: bool,
    },
}

/// One simulated 24-hour ED shift.
pub struct ShiftEnv {
    shift: ShiftSection,
    rewards: RewardSection,
    capacity: CapacitySection,
    embedding_dim: usize,
    rng: StdRng,
    seed: u64,
    /// Trace to replay instead of synthetic arrivals
    trace: Option<Vec<ArrivalRecord>>,

    clock_min: f64,
    /// Timeline keyed by (time in ms, insertion seq)
    timeline: BTreeMap<(i64, u64), SimEvent>,
    timeline_seq: u64,
    waiting: Vec<WaitingPatient>,
    current: Option<ArrivalRecord>,
    critical_occupied: u32,
    acute_occupied: u32,
    fast_track_occupied: u32,
    done: bool,
}

impl ShiftEnv {
    /// Synthetic-arrival environment for policy learning.
    pub fn new(
        shift: ShiftSection,
        rewards: RewardSection,
        capacity: CapacitySection,
        scorer: ScorerSection,
        seed: u64,
    ) -> Self {
        Self {
            shift,
            rewards,
            capacity,
            embedding_dim: scorer.embedding_dim,
            rng: StdRng::seed_from_u64(seed),
            seed,
            trace: None,
            clock_min: 0.0,
            timeline: BTreeMap::new(),
            timeline_seq: 0,
            waiting: Vec::new(),
            current: None,
            critical_occupied: 0,
            acute_occupied: 0,
            fast_track_occupied: 0,
            done: false,
        }
    }

    /// Trace-replay environment for evaluating a policy against a recorded
    /// shift. The state/action/reward contract is identical to training.
    /// A trace that drains before the 24-hour mark ends the episode there,
    /// with the clock run out to shift end.
    pub fn from_trace(
        shift: ShiftSection,
        rewards: RewardSection,
        capacity: CapacitySection,
        scorer: ScorerSection,
        seed: u64,
        trace: Vec<ArrivalRecord>,
    ) -> Self {
        let mut env = Self::new(shift, rewards, capacity, scorer, seed);
        env.trace = Some(trace);
        env
    }

    /// Reinitialize the department to empty and advance to the first
    /// arrival. Returns the initial state vector.
    pub fn reset(&mut self) -> Vec<f64> {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.clock_min = 0.0;
        self.timeline.clear();
        self.timeline_seq = 0;
        self.waiting.clear();
        self.current = None;
        self.critical_occupied = 0;
        self.acute_occupied = 0;
        self.fast_track_occupied = 0;
        self.done = false;

        let arrivals = match &self.trace {
            Some(trace) => trace.clone(),
            None => self.generate_arrivals(),
        };
        for record in arrivals {
            self.push_event(record.arrival_minute, SimEvent::Arrival(record));
        }

        let mut info = StepInfo::default();
        let mut reward_sink = 0.0;
        self.advance(&mut reward_sink, &mut info);
        self.state()
    }

    /// Apply `action` to the addressed patient, advance simulated time to
    /// the next decision point, and return the outcome.
    pub fn step(&mut self, action: ResourceAction) -> StepOutcome {
        let mut info = StepInfo::default();
        let mut reward = 0.0;

        if self.done {
            return StepOutcome {
                state: self.state(),
                reward,
                done: true,
                info,
            };
        }

        if let Some(patient) = self.current.take() {
            reward += self.apply_action(patient, action);
        }

        self.advance(&mut reward, &mut info);

        let done = self.done;
        StepOutcome {
            state: self.state(),
            reward,
            done,
            info: StepInfo {
                patient_id: self.current.as_ref().map(|p| p.patient_id.clone()),
                true_acuity: self.current.as_ref().map(|p| p.acuity.level()),
                ..info
            },
        }
    }

    /// Current state vector. Probabilities and embedding come from the
    /// addressed patient; zeros when none is pending.
    pub fn state(&self) -> Vec<f64> {
        let (probs, confidence, embedding): ([f64; NUM_CLASSES], f64, &[f64]) =
            match &self.current {
                Some(p) => {
                    let conf = p.probs.iter().fold(0.0_f64, |a, &b| a.max(b));
                    (p.probs, conf, p.embedding.as_slice())
                }
                None => ([0.0; NUM_CLASSES], 0.0, &[]),
            };
        build_state(
            &probs,
            confidence,
            embedding,
            &self.operational_state(),
            self.embedding_dim,
        )
    }

    /// Department snapshot derived from the simulation's own counters.
    pub fn operational_state(&self) -> OperationalState {
        let avg_wait = if self.waiting.is_empty() {
            0.0
        } else {
            let total: f64 = self
                .waiting
                .iter()
                .map(|w| (self.clock_min - w.record.arrival_minute).max(0.0))
                .sum();
            total / self.waiting.len() as f64
        };
        OperationalState {
            critical_free: self.capacity.critical_beds.saturating_sub(self.critical_occupied),
            acute_free: self.capacity.acute_beds.saturating_sub(self.acute_occupied),
            fast_track_free: self
                .capacity
                .fast_track_slots
                .saturating_sub(self.fast_track_occupied),
            num_waiting: self.waiting.len() as u32,
            avg_wait_minutes: avg_wait,
            hour_of_day: (self.clock_min / 60.0) % 24.0,
            day_of_week: 0,
        }
    }

    // ------------------------------------------------------------------
    // Action application
    // ------------------------------------------------------------------

    fn apply_action(&mut self, patient: ArrivalRecord, action: ResourceAction) -> f64 {
        let mut reward = 0.0;

        // Safety: under-triage of a critical patient dominates everything
        if patient.acuity.is_critical()
            && matches!(action, ResourceAction::WaitingRoom | ResourceAction::FastTrack)
        {
            reward += self.rewards.under_triage;
        }
        // Resource: over-triage of a low-acuity patient to a critical bed
        if patient.acuity.level() >= 4 && action == ResourceAction::CriticalBed {
            reward += self.rewards.over_triage;
        }

        match action {
            ResourceAction::WaitingRoom => {
                self.waiting.push(WaitingPatient { record: patient, deteriorated: false });
            }
            ResourceAction::FastTrack => {
                if self.fast_track_occupied < self.capacity.fast_track_slots {
                    self.fast_track_occupied += 1;
                    let los = self.sample_los(60.0);
                    self.schedule_departure(los, ResourceAction::FastTrack, false);
                } else {
                    self.waiting.push(WaitingPatient { record: patient, deteriorated: false });
                }
            }
            ResourceAction::AcuteBed => {
                if self.acute_occupied < self.capacity.acute_beds {
                    self.acute_occupied += 1;
                    let los = self.sample_los(self.shift.mean_los_minutes);
                    self.schedule_departure(los, ResourceAction::AcuteBed, false);
                } else {
                    self.waiting.push(WaitingPatient { record: patient, deteriorated: false });
                }
            }
            ResourceAction::CriticalBed => {
                if self.critical_occupied < self.capacity.critical_beds {
                    self.critical_occupied += 1;
                    let los = self.sample_los(self.shift.mean_los_minutes * 1.5);
                    self.schedule_departure(los, ResourceAction::CriticalBed, false);
                } else {
                    self.waiting.push(WaitingPatient { record: patient, deteriorated: false });
                }
            }
            ResourceAction::AdvancedDiagnostics => {
                reward += self.rewards.diagnostics;
                // Diagnostics shortens the stay by a sampled amount; the
                // order cost is refunded only when the saving is real.
                let saving = self
                    .sample_normal(self.shift.diagnostics_los_saving_minutes, 15.0)
                    .max(0.0);
                let base_los = self.sample_los(self.shift.mean_los_minutes);
                let los = (base_los - saving).max(15.0);
                let refund = saving > 0.0 && los < base_los;
                if self.acute_occupied < self.capacity.acute_beds {
                    self.acute_occupied += 1;
                    self.schedule_departure(los, ResourceAction::AcuteBed, refund);
                } else {
                    self.waiting.push(WaitingPatient { record: patient, deteriorated: false });
                }
            }
        }
        reward
    }

    // ------------------------------------------------------------------
    // Time advancement
    // ------------------------------------------------------------------

    /// Advance the timeline until the next decision point (a new arrival or
    /// a promoted waiting patient) or episode end. Accrues waiting cost,
    /// deterioration penalties, and discharge bonuses along the way.
    fn advance(&mut self, reward: &mut f64, info: &mut StepInfo) {
        loop {
            let Some((&key, _)) = self.timeline.iter().next() else {
                // No scheduled events left. Promote a waiting patient for
                // re-decision, or finish the episode.
                if !self.waiting.is_empty() {
                    self.accrue_waiting(STALL_TICK_MINUTES, reward, info);
                    self.clock_min += STALL_TICK_MINUTES;
                    self.current = self.promote_waiting();
                    return;
                }
                // Every arrival handled and the department drained; run
                // the clock out to shift end. A sparse trace can drain
                // well before the 24-hour mark.
                self.clock_min = self.clock_min.max(SHIFT_MINUTES);
                self.done = true;
                return;
            };

            let event_min = key.0 as f64 / 1000.0 / 60.0;
            let dt = (event_min - self.clock_min).max(0.0);
            self.accrue_waiting(dt, reward, info);
            self.clock_min = event_min;

            let Some(event) = self.timeline.remove(&key) else {
                continue;
            };
            match event {
                SimEvent::Arrival(record) => {
                    debug!(patient_id = %record.patient_id, minute = self.clock_min, "Arrival");
                    self.current = Some(record);
                    return;
                }
                SimEvent::Departure { action, diagnostics_refund } => {
                    self.release(action);
                    *reward += self.rewards.discharge;
                    if diagnostics_refund {
                        *reward -= self.rewards.diagnostics;
                    }
                    info.discharged += 1;
                    // A freed resource is a decision point when someone waits
                    if let Some(patient) = self.promote_waiting() {
                        self.current = Some(patient);
                        return;
                    }
                }
            }
        }
    }

    /// Waiting cost and deterioration checks over `dt` minutes.
    fn accrue_waiting(&mut self, dt: f64, reward: &mut f64, info: &mut StepInfo) {
        if dt <= 0.0 || self.waiting.is_empty() {
            return;
        }
        *reward += self.rewards.wait_per_minute * dt * self.waiting.len() as f64;

        let p_deteriorate = (self.shift.deterioration_per_hour * dt / 60.0).clamp(0.0, 1.0);
        let mut penalties = 0u32;
        for w in &mut self.waiting {
            if w.record.acuity.is_critical()
                && !w.deteriorated
                && self.rng.gen_bool(p_deteriorate)
            {
                w.deteriorated = true;
                penalties += 1;
            }
        }
        if penalties > 0 {
            *reward += self.rewards.deterioration * f64::from(penalties);
            info.deteriorations += penalties;
        }
    }

    /// Most severe, earliest-arrived waiting patient.
    fn promote_waiting(&mut self) -> Option<ArrivalRecord> {
        let best = self
            .waiting
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.record
                    .acuity
                    .cmp(&b.record.acuity)
                    .then(a.record.arrival_minute.total_cmp(&b.record.arrival_minute))
            })?
            .0;
        Some(self.waiting.remove(best).record)
    }

    fn release(&mut self, action: ResourceAction) {
        match action {
            ResourceAction::CriticalBed => {
                self.critical_occupied = self.critical_occupied.saturating_sub(1);
            }
            ResourceAction::AcuteBed => {
                self.acute_occupied = self.acute_occupied.saturating_sub(1);
            }
            ResourceAction::FastTrack => {
                self.fast_track_occupied = self.fast_track_occupied.saturating_sub(1);
            }
            ResourceAction::WaitingRoom | ResourceAction::AdvancedDiagnostics => {}
        }
    }

    fn push_event(&mut self, minute: f64, event: SimEvent) {
        self.timeline_seq += 1;
        let key = ((minute * 60_000.0) as i64, self.timeline_seq);
        self.timeline.insert(key, event);
    }

    fn schedule_departure(&mut self, los_minutes: f64, action: ResourceAction, refund: bool) {
        self.push_event(
            self.clock_min + los_minutes,
            SimEvent::Departure { action, diagnostics_refund: refund },
        );
    }

    // ------------------------------------------------------------------
    // Synthetic arrival generation
    // ------------------------------------------------------------------

    fn sample_los(&mut self, mean: f64) -> f64 {
        self.sample_normal(mean, mean / 4.0).max(20.0)
    }

    fn sample_normal(&mut self, mean: f64, std: f64) -> f64 {
        match Normal::new(mean, std) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    fn generate_arrivals(&mut self) -> Vec<ArrivalRecord> {
        let mut arrivals = Vec::new();
        let mean_gap = 60.0 / self.shift.arrivals_per_hour.max(0.1);
        let gap_dist = match Exp::new(1.0 / mean_gap) {
            Ok(d) => d,
            Err(_) => return arrivals,
        };

        let mut t = gap_dist.sample(&mut self.rng);
        let mut n = 0usize;
        while t < SHIFT_MINUTES {
            n += 1;
            let acuity = self.sample_acuity();
            let probs = self.sample_probs(acuity);
            arrivals.push(ArrivalRecord {
                patient_id: format!("SIM-{n:04}"),
                arrival_minute: t,
                acuity,
                probs,
                embedding: vec![0.0; self.embedding_dim],
            });
            t += gap_dist.sample(&mut self.rng);
        }
        arrivals
    }

    fn sample_acuity(&mut self) -> Severity {
        let roll: f64 = self.rng.gen();
        let mut acc = 0.0;
        for (i, share) in ACUITY_MIX.iter().enumerate() {
            acc += share;
            if roll <= acc {
                return Severity::from_prob_index(i).unwrap_or(Severity::Urgent);
            }
        }
        Severity::NonUrgent
    }

    /// Noisy classifier view of a patient: mass concentrated on the true
    /// level most of the time, on a neighbor otherwise.
    fn sample_probs(&mut self, acuity: Severity) -> [f64; NUM_CLASSES] {
        let true_idx = usize::from(acuity.level()) - 1;
        let predicted = if self.rng.gen_bool(0.75) {
            true_idx
        } else if true_idx == 0 || (true_idx < NUM_CLASSES - 1 && self.rng.gen_bool(0.5)) {
            true_idx + 1
        } else {
            true_idx - 1
        };
        let confidence: f64 = self.rng.gen_range(0.40..0.95);
        let rest = (1.0 - confidence) / (NUM_CLASSES - 1) as f64;
        let mut probs = [rest; NUM_CLASSES];
        probs[predicted] = confidence;
        probs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::state_dim;

    fn env(seed: u64) -> ShiftEnv {
        ShiftEnv::new(
            ShiftSection::default(),
            RewardSection::default(),
            CapacitySection::default(),
            ScorerSection::default(),
            seed,
        )
    }

    fn record(id: &str, minute: f64, acuity: Severity) -> ArrivalRecord {
        let mut probs = [0.05; NUM_CLASSES];
        probs[usize::from(acuity.level()) - 1] = 0.8;
        ArrivalRecord {
            patient_id: id.to_string(),
            arrival_minute: minute,
            acuity,
            probs,
            embedding: vec![],
        }
    }

    #[test]
    fn test_reset_returns_fixed_length_state() {
        let mut e = env(7);
        let state = e.reset();
        assert_eq!(state.len(), state_dim(ScorerSection::default().embedding_dim));
    }

    #[test]
    fn test_under_triage_penalized() {
        let trace = vec![record("P-1", 1.0, Severity::Immediate)];
        let mut e = ShiftEnv::from_trace(
            ShiftSection::default(),
            RewardSection::default(),
            CapacitySection::default(),
            ScorerSection::default(),
            3,
            trace,
        );
        e.reset();
        let out = e.step(ResourceAction::WaitingRoom);
        assert!(out.reward <= RewardSection::default().under_triage);
    }

    #[test]
    fn test_over_triage_penalized_and_discharge_rewarded() {
        let trace = vec![record("P-1", 1.0, Severity::NonUrgent)];
        let mut e = ShiftEnv::from_trace(
            ShiftSection::default(),
            RewardSection::default(),
            CapacitySection::default(),
            ScorerSection::default(),
            3,
            trace,
        );
        e.reset();
        let out = e.step(ResourceAction::CriticalBed);
        // Over-triage penalty and the eventual discharge bonus both land in
        // this step (the departure is the only remaining event).
        assert!((out.reward - (-10.0 + 10.0)).abs() < 1e-9);
        assert!(out.done);
    }

    #[test]
    fn test_exhausted_trace_runs_clock_to_shift_end() {
        let trace = vec![record("P-1", 1.0, Severity::NonUrgent)];
        let mut e = ShiftEnv::from_trace(
            ShiftSection::default(),
            RewardSection::default(),
            CapacitySection::default(),
            ScorerSection::default(),
            3,
            trace,
        );
        e.reset();
        let out = e.step(ResourceAction::FastTrack);
        assert!(out.done);
        assert!(e.clock_min >= SHIFT_MINUTES);
    }

    #[test]
    fn test_episode_terminates() {
        let mut e = env(11);
        e.reset();
        let mut steps = 0usize;
        loop {
            // Always assign acute beds; overflow waits and is promoted later
            let out = e.step(ResourceAction::AcuteBed);
            steps += 1;
            if out.done {
                assert_eq!(
                    out.state.len(),
                    state_dim(ScorerSection::default().embedding_dim)
                );
                break;
            }
            assert!(steps < 5000, "episode failed to terminate");
        }
    }

    #[test]
    fn test_trace_and_training_share_contract() {
        let trace = vec![
            record("P-1", 1.0, Severity::Urgent),
            record("P-2", 5.0, Severity::LessUrgent),
        ];
        let mut e = ShiftEnv::from_trace(
            ShiftSection::default(),
            RewardSection::default(),
            CapacitySection::default(),
            ScorerSection::default(),
            3,
            trace,
        );
        let state = e.reset();
        assert_eq!(state.len(), state_dim(ScorerSection::default().embedding_dim));
        let out = e.step(ResourceAction::AcuteBed);
        assert_eq!(out.state.len(), state.len());
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let mut a = env(42);
        let mut b = env(42);
        assert_eq!(a.reset(), b.reset());
        let oa = a.step(ResourceAction::AcuteBed);
        let ob = b.step(ResourceAction::AcuteBed);
        assert_eq!(oa.state, ob.state);
        assert!((oa.reward - ob.reward).abs() < 1e-12);
    }
}
