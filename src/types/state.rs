//! Operational state snapshot of the emergency department

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of department occupancy and tempo.
///
/// Mutated only through the priority queue's admission API (the single
/// logical owner); every other component reads a snapshot, never a live
/// reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OperationalState {
    /// Free critical-care beds
    pub critical_free: u32,
    /// Free acute-care beds
    pub acute_free: u32,
    /// Free fast-track slots
    pub fast_track_free: u32,
    /// Patients currently waiting in the queue
    pub num_waiting: u32,
    /// Rolling average wait across queued patients (minutes)
    pub avg_wait_minutes: f64,
    /// Hour of day, fractional (0.0 ..< 24.0)
    pub hour_of_day: f64,
    /// Day of week (0 = Monday .. 6 = Sunday)
    pub day_of_week: u8,
}

impl Default for OperationalState {
    fn default() -> Self {
        Self {
            critical_free: 0,
            acute_free: 0,
            fast_track_free: 0,
            num_waiting: 0,
            avg_wait_minutes: 0.0,
            hour_of_day: 0.0,
            day_of_week: 0,
        }
    }
}

impl OperationalState {
    /// An empty department with the given capacities fully free.
    pub fn with_capacity(critical: u32, acute: u32, fast_track: u32) -> Self {
        Self {
            critical_free: critical,
            acute_free: acute,
            fast_track_free: fast_track,
            ..Self::default()
        }
    }
}
