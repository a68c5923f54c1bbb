// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Bounded window of recent sample timestamps

use std::collections::VecDeque;

/// How many timestamps an instantaneous-rate computation needs.
pub(crate) const RATE_WINDOW: usize = 2;

/// Rolling window of the most recent raw sample timestamps for one sensor.
///
/// Timestamps are monotonic nanoseconds as delivered by the sensor
/// subsystem. The window holds exactly enough history for one
/// instantaneous-rate computation; pushing beyond capacity evicts the
/// oldest entry.
#[derive(Debug, Default)]
pub struct SampleWindow {
    timestamps: VecDeque<i64>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self {
            timestamps: VecDeque::with_capacity(RATE_WINDOW + 1),
        }
    }

    /// Append a raw sample timestamp, evicting the oldest beyond capacity.
    pub fn push(&mut self, timestamp_ns: i64) {
        self.timestamps.push_back(timestamp_ns);
        while self.timestamps.len() > RATE_WINDOW {
            self.timestamps.pop_front();
        }
    }

    /// The two most recent timestamps as (previous, latest), if present.
    pub fn latest_pair(&self) -> Option<(i64, i64)> {
        if self.timestamps.len() < RATE_WINDOW {
            return None;
        }
        let latest = *self.timestamps.back()?;
        let previous = self.timestamps[self.timestamps.len() - 2];
        Some((previous, latest))
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
