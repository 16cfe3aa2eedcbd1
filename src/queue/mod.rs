//! Priority Queue - severity-then-arrival total order over pending patients
//!
//! Total-orders pending patients by `(severity ascending, enqueue timestamp
//! ascending, admit sequence)`: most severe and earliest-arrived dispatched
//! first. The queue is also the single owner of the department's
//! `OperationalState`; bed occupancy and waiting counts are mutated only
//! through this module's API, and every other component reads a snapshot.
//!
//! All mutating operations take the interior write lock for their whole
//! duration, so no reader ever observes a partially updated entry.

use crate::config::CapacitySection;
use crate::types::{Decision, OperationalState, ResourceAction};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors from queue identity operations. Surfaced to the caller, never
/// retried: silently creating or ignoring an unknown patient could hide a
/// lost decision.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("no live queue entry for patient {0}")]
    UnknownPatient(String),
}

/// A decision wrapped with its queue lifecycle fields. Owned exclusively by
/// the queue; removed when the patient is dispatched or withdrawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    /// Unique entry identifier
    pub entry_id: Uuid,
    /// The decision being queued
    pub decision: Decision,
    /// First enqueue timestamp; preserved across reprioritization
    pub enqueued_at: DateTime<Utc>,
}

/// Ordering key: severity first, then first-enqueue time, then admit
/// sequence as a total-order tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    severity: u8,
    enqueued_ms: i64,
    seq: u64,
}

#[derive(Default)]
struct QueueInner {
    ordered: BTreeMap<QueueKey, QueueEntry>,
    by_patient: HashMap<String, QueueKey>,
    seq: u64,
    critical_occupied: u32,
    acute_occupied: u32,
    fast_track_occupied: u32,
}

impl QueueInner {
    fn key_for(&mut self, decision: &Decision, enqueued_at: DateTime<Utc>) -> QueueKey {
        self.seq += 1;
        QueueKey {
            severity: decision.severity.level(),
            enqueued_ms: enqueued_at.timestamp_millis(),
            seq: self.seq,
        }
    }

    fn remove_patient(&mut self, patient_id: &str) -> Option<QueueEntry> {
        let key = self.by_patient.remove(patient_id)?;
        self.ordered.remove(&key)
    }

    fn insert(&mut self, entry: QueueEntry) {
        let key = self.key_for(&entry.decision, entry.enqueued_at);
        self.by_patient.insert(entry.decision.patient_id.clone(), key);
        self.ordered.insert(key, entry);
    }

    fn occupy(&mut self, action: ResourceAction) {
        match action {
            ResourceAction::CriticalBed => self.critical_occupied += 1,
            ResourceAction::AcuteBed => self.acute_occupied += 1,
            ResourceAction::FastTrack => self.fast_track_occupied += 1,
            ResourceAction::WaitingRoom | ResourceAction::AdvancedDiagnostics => {}
        }
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
}

/// The pending-patient priority queue and operational-state owner.
pub struct TriageQueue {
    inner: RwLock<QueueInner>,
    capacity: CapacitySection,
}

impl TriageQueue {
    pub fn new(capacity: CapacitySection) -> Self {
        info!(
            critical = capacity.critical_beds,
            acute = capacity.acute_beds,
            fast_track = capacity.fast_track_slots,
            "Triage queue initialized"
        );
        Self {
            inner: RwLock::new(QueueInner::default()),
            capacity,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, QueueInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, QueueInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a decision, atomically replacing any live entry for the same
    /// patient (re-triage supersedes, it never duplicates). Returns the new
    /// entry and whether an entry was replaced.
    pub fn admit(&self, decision: Decision, now: DateTime<Utc>) -> (QueueEntry, bool) {
        let entry = QueueEntry {
            entry_id: Uuid::new_v4(),
            decision,
            enqueued_at: now,
        };
        let mut inner = self.write();
        let replaced = inner.remove_patient(&entry.decision.patient_id).is_some();
        inner.insert(entry.clone());
        debug!(
            patient_id = %entry.decision.patient_id,
            severity = %entry.decision.severity,
            replaced,
            "Patient admitted to queue"
        );
        (entry, replaced)
    }

    /// Highest-priority entry without removing it.
    pub fn peek(&self) -> Option<QueueEntry> {
        self.read().ordered.values().next().cloned()
    }

    /// Remove and return the highest-priority entry, occupying its target
    /// resource.
    pub fn pop(&self) -> Option<QueueEntry> {
        let mut inner = self.write();
        let key = *inner.ordered.keys().next()?;
        let entry = inner.ordered.remove(&key)?;
        inner.by_patient.remove(&entry.decision.patient_id);
        inner.occupy(entry.decision.action);
        debug!(
            patient_id = %entry.decision.patient_id,
            action = %entry.decision.action,
            "Patient dispatched"
        );
        Some(entry)
    }

    /// Replace an entry's decision fields without losing its queue position
    /// history: the first enqueue timestamp is preserved, so a re-triage to
    /// the same severity keeps its place in line.
    pub fn reprioritize(
        &self,
        patient_id: &str,
        new_decision: Decision,
    ) -> Result<QueueEntry, QueueError> {
        let mut inner = self.write();
        let old = inner
            .remove_patient(patient_id)
            .ok_or_else(|| QueueError::UnknownPatient(patient_id.to_string()))?;
        let entry = QueueEntry {
            entry_id: old.entry_id,
            decision: new_decision,
            enqueued_at: old.enqueued_at,
        };
        inner.insert(entry.clone());
        debug!(patient_id, severity = %entry.decision.severity, "Entry reprioritized");
        Ok(entry)
    }

    /// Live entry for a patient, if any.
    pub fn get(&self, patient_id: &str) -> Option<QueueEntry> {
        let inner = self.read();
        let key = inner.by_patient.get(patient_id)?;
        inner.ordered.get(key).cloned()
    }

    /// Remove a patient (discharged or left without being seen).
    pub fn withdraw(&self, patient_id: &str) -> Result<QueueEntry, QueueError> {
        let mut inner = self.write();
        inner
            .remove_patient(patient_id)
            .ok_or_else(|| QueueError::UnknownPatient(patient_id.to_string()))
    }

    /// Free the resource a previously dispatched action occupied.
    pub fn release(&self, action: ResourceAction) {
        self.write().release(action);
    }

    /// Point-in-time ordered snapshot of all live entries.
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.read().ordered.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().ordered.is_empty()
    }

    pub fn contains(&self, patient_id: &str) -> bool {
        self.read().by_patient.contains_key(patient_id)
    }

    /// Consistent snapshot of department occupancy and queue tempo.
    pub fn operational_snapshot(&self, now: DateTime<Utc>) -> OperationalState {
        let inner = self.read();
        let num_waiting = inner.ordered.len() as u32;
        let avg_wait_minutes = if inner.ordered.is_empty() {
            0.0
        } else {
            let total: f64 = inner
                .ordered
                .values()
                .map(|e| (now - e.enqueued_at).num_seconds().max(0) as f64 / 60.0)
                .sum();
            total / inner.ordered.len() as f64
        };
        OperationalState {
            critical_free: self.capacity.critical_beds.saturating_sub(inner.critical_occupied),
            acute_free: self.capacity.acute_beds.saturating_sub(inner.acute_occupied),
            fast_track_free: self
                .capacity
                .fast_track_slots
                .saturating_sub(inner.fast_track_occupied),
            num_waiting,
            avg_wait_minutes,
            hour_of_day: f64::from(now.hour()) + f64::from(now.minute()) / 60.0,
            day_of_week: now.weekday().num_days_from_monday() as u8,
        }
    }
}
