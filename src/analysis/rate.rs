// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Instantaneous sampling-rate estimation
//!
//! The same formula serves the real-time monitor (over a 2-sample window)
//! and the offline profiling pipeline (over whole recorded logs), so both
//! sides of the system agree on what "the rate" is.

use crate::sensors::SampleWindow;

/// Nanoseconds per second, as a float for rate conversion.
pub const NANOS_PER_SEC: f64 = 1e9;

/// Rate in Hz between two consecutive sample timestamps (nanoseconds).
///
/// Returns `None` for a non-positive delta: a duplicate timestamp or a
/// clock anomaly must never turn into an infinite or negative rate.
pub fn instantaneous_rate(previous_ns: i64, latest_ns: i64) -> Option<f64> {
    let delta = latest_ns - previous_ns;
    if delta > 0 {
        Some(NANOS_PER_SEC / delta as f64)
    } else {
        None
    }
}

/// Rate estimate for a sensor's current sample window, if it holds enough
/// history.
pub fn window_rate(window: &SampleWindow) -> Option<f64> {
    let (previous, latest) = window.latest_pair()?;
    instantaneous_rate(previous, latest)
}
