//! Detection module - real-time covert sensor usage detection
//!
//! A per-sensor state machine watches the instantaneous delivery rate of
//! each monitored sensor. The engine itself registers at a slow rate, so a
//! sustained delivery rate above the configured threshold means some other
//! process holds a faster registration on the same hardware.

mod dispatcher;
mod monitor;
mod state_machine;

pub use dispatcher::{DetectionCallback, EventDispatcher};
pub use monitor::DetectionMonitor;
pub use state_machine::{SensorStateData, TickOutcome};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensors::SensorKind;

/// Detection state of one sensor.
///
/// The only legal walk is Idle -> Active -> Detected -> Idle; no transition
/// skips a state in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorState {
    /// Delivery rate at or below the threshold.
    Idle,
    /// Above threshold, not yet sustained long enough to report.
    Active,
    /// Confirmed external usage in progress.
    Detected,
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorState::Idle => "Idle",
            SensorState::Active => "Active",
            SensorState::Detected => "Detected",
        };
        f.write_str(name)
    }
}

/// What a detection event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// External sensor usage confirmed (Active -> Detected).
    UsageStarted,
    /// External sensor usage ceased (Detected -> Idle).
    UsageEnded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::UsageStarted => "usage started",
            EventKind::UsageEnded => "usage ended",
        };
        f.write_str(name)
    }
}

/// A reported detection transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub sensor: SensorKind,
    pub sensor_name: String,
    pub kind: EventKind,
    /// Instantaneous delivery rate at the moment of the transition, Hz.
    pub instant_rate: f64,
    /// Threshold in effect when the transition fired, Hz.
    pub threshold: f64,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub(crate) fn new(
        sensor: SensorKind,
        kind: EventKind,
        instant_rate: f64,
        threshold: f64,
        now_ms: i64,
    ) -> Self {
        Self {
            sensor,
            sensor_name: sensor.display_name().to_string(),
            kind,
            instant_rate,
            threshold,
            timestamp: DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now),
        }
    }
}

/// Source of per-sensor detection thresholds.
///
/// Implementations may change their answer between ticks; the monitor
/// re-reads every tick and never caches across a session. `None` (or a
/// non-positive value) means the sensor is not yet calibrated and is
/// skipped for that tick.
pub trait ThresholdProvider: Send + Sync {
    fn threshold(&self, kind: SensorKind) -> Option<f64>;
}
