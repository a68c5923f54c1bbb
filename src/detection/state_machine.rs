// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Per-sensor detection state machine

use tracing::debug;

use super::SensorState;
use crate::config::DetectionConfig;
use crate::sensors::{SampleWindow, SensorKind};

/// Result of one analysis tick for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No reportable transition this tick.
    None,
    /// Active -> Detected: external usage confirmed.
    Started { rate: f64 },
    /// Detected -> Idle: external usage ceased.
    Ended { rate: f64 },
}

/// Mutable detection state for one sensor.
///
/// Created fresh when detection starts and discarded when it stops; nothing
/// here survives across sessions. Written by the sample-producer thread
/// (`window` only) and by the analysis tick (everything), so the owner keeps
/// each instance behind its own lock.
#[derive(Debug)]
pub struct SensorStateData {
    state: SensorState,
    /// Wall-clock ms when `state` was entered; drives the sustain check.
    state_start_ms: i64,
    /// Consecutive ticks confirming a pending transition.
    confirmation_count: u32,
    /// Recent raw sample timestamps for rate estimation.
    pub window: SampleWindow,
}

impl SensorStateData {
    pub fn new() -> Self {
        Self {
            state: SensorState::Idle,
            state_start_ms: 0,
            confirmation_count: 0,
            window: SampleWindow::new(),
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Advance the state machine by one analysis tick.
    ///
    /// `rate` is the current instantaneous estimate and `threshold` the
    /// configured limit, both already validated by the caller; ticks with
    /// no valid estimate or threshold never reach this function.
    ///
    /// The confirmation counter debounces in both directions and resets
    /// whenever the direction of evidence flips. It is deliberately left
    /// untouched on the Active -> Detected transition; Detected clears it
    /// on the next above-threshold tick.
    pub fn advance(
        &mut self,
        sensor: SensorKind,
        rate: f64,
        threshold: f64,
        now_ms: i64,
        config: &DetectionConfig,
    ) -> TickOutcome {
        let above = rate > threshold;

        match self.state {
            SensorState::Idle => {
                if above {
                    self.confirmation_count += 1;
                    if self.confirmation_count >= config.confirmation_samples {
                        self.state = SensorState::Active;
                        self.state_start_ms = now_ms;
                        self.confirmation_count = 0;
                        debug!("{} entered Active ({:.1} Hz)", sensor, rate);
                    }
                } else {
                    self.confirmation_count = 0;
                }
                TickOutcome::None
            }

            SensorState::Active => {
                if above {
                    let sustained = now_ms - self.state_start_ms;
                    if sustained >= config.min_sustained_ms {
                        self.state = SensorState::Detected;
                        debug!("{} Detected after {}ms sustained", sensor, sustained);
                        return TickOutcome::Started { rate };
                    }
                    TickOutcome::None
                } else {
                    self.confirmation_count += 1;
                    if self.confirmation_count >= config.confirmation_samples {
                        // Brief spike, not genuine usage. No event.
                        self.state = SensorState::Idle;
                        self.confirmation_count = 0;
                        debug!("{} spike ended before sustain, back to Idle", sensor);
                    }
                    TickOutcome::None
                }
            }

            SensorState::Detected => {
                if above {
                    self.confirmation_count = 0;
                    TickOutcome::None
                } else {
                    self.confirmation_count += 1;
                    if self.confirmation_count >= config.confirmation_samples {
                        self.state = SensorState::Idle;
                        self.confirmation_count = 0;
                        debug!("{} usage ended", sensor);
                        return TickOutcome::Ended { rate };
                    }
                    TickOutcome::None
                }
            }
        }
    }
}

impl Default for SensorStateData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABOVE: f64 = 6.0;
    const BELOW: f64 = 2.0;
    const THRESHOLD: f64 = 5.0;

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    /// Drive one tick and return the outcome.
    fn tick(data: &mut SensorStateData, rate: f64, now_ms: i64) -> TickOutcome {
        data.advance(SensorKind::Accelerometer, rate, THRESHOLD, now_ms, &config())
    }

    #[test]
    fn test_three_confirmations_enter_active() {
        let mut data = SensorStateData::new();
        assert_eq!(tick(&mut data, ABOVE, 0), TickOutcome::None);
        assert_eq!(data.state(), SensorState::Idle);
        assert_eq!(tick(&mut data, ABOVE, 100), TickOutcome::None);
        assert_eq!(data.state(), SensorState::Idle);
        assert_eq!(tick(&mut data, ABOVE, 200), TickOutcome::None);
        assert_eq!(data.state(), SensorState::Active);
    }

    #[test]
    fn test_debounce_resets_on_reversal() {
        // 2 above, 1 below, 2 above: must stay Idle until 3 consecutive.
        let mut data = SensorStateData::new();
        tick(&mut data, ABOVE, 0);
        tick(&mut data, ABOVE, 100);
        tick(&mut data, BELOW, 200);
        tick(&mut data, ABOVE, 300);
        tick(&mut data, ABOVE, 400);
        assert_eq!(data.state(), SensorState::Idle);
        tick(&mut data, ABOVE, 500);
        assert_eq!(data.state(), SensorState::Active);
    }

    #[test]
    fn test_sustain_required_before_detection() {
        let mut data = SensorStateData::new();
        for t in [0, 100, 200] {
            tick(&mut data, ABOVE, t);
        }
        assert_eq!(data.state(), SensorState::Active);
        // 100ms after entering Active: below the 200ms sustain, no event.
        assert_eq!(tick(&mut data, ABOVE, 300), TickOutcome::None);
        assert_eq!(data.state(), SensorState::Active);
        // 200ms sustained: detection fires.
        assert_eq!(tick(&mut data, ABOVE, 400), TickOutcome::Started { rate: ABOVE });
        assert_eq!(data.state(), SensorState::Detected);
    }

    #[test]
    fn test_spike_abort_emits_nothing() {
        let mut data = SensorStateData::new();
        for t in [0, 100, 200] {
            tick(&mut data, ABOVE, t);
        }
        assert_eq!(data.state(), SensorState::Active);
        // Dropping below threshold before sustain completes never reports.
        for t in [300, 400, 500] {
            assert_eq!(tick(&mut data, BELOW, t), TickOutcome::None);
        }
        assert_eq!(data.state(), SensorState::Idle);
    }

    #[test]
    fn test_usage_end_after_three_below() {
        let mut data = detected_state();
        assert_eq!(tick(&mut data, BELOW, 1000), TickOutcome::None);
        assert_eq!(tick(&mut data, BELOW, 1100), TickOutcome::None);
        assert_eq!(tick(&mut data, BELOW, 1200), TickOutcome::Ended { rate: BELOW });
        assert_eq!(data.state(), SensorState::Idle);
    }

    #[test]
    fn test_detected_holds_through_brief_dips() {
        let mut data = detected_state();
        tick(&mut data, BELOW, 1000);
        tick(&mut data, BELOW, 1100);
        // An above-threshold tick clears the pending end.
        tick(&mut data, ABOVE, 1200);
        tick(&mut data, BELOW, 1300);
        tick(&mut data, BELOW, 1400);
        assert_eq!(data.state(), SensorState::Detected);
        assert_eq!(tick(&mut data, BELOW, 1500), TickOutcome::Ended { rate: BELOW });
    }

    #[test]
    fn test_no_state_is_skipped() {
        // A long mixed sequence may only ever walk Idle->Active->Detected->Idle.
        let mut data = SensorStateData::new();
        let rates = [
            ABOVE, BELOW, ABOVE, ABOVE, ABOVE, ABOVE, ABOVE, BELOW, ABOVE, BELOW, BELOW, BELOW,
            ABOVE, ABOVE, ABOVE, ABOVE,
        ];
        let mut previous = data.state();
        for (i, rate) in rates.iter().enumerate() {
            tick(&mut data, *rate, i as i64 * 100);
            let current = data.state();
            let legal = matches!(
                (previous, current),
                (SensorState::Idle, SensorState::Idle)
                    | (SensorState::Idle, SensorState::Active)
                    | (SensorState::Active, SensorState::Active)
                    | (SensorState::Active, SensorState::Detected)
                    | (SensorState::Active, SensorState::Idle)
                    | (SensorState::Detected, SensorState::Detected)
                    | (SensorState::Detected, SensorState::Idle)
            );
            assert!(legal, "illegal transition {:?} -> {:?}", previous, current);
            previous = current;
        }
    }

    #[test]
    fn test_counter_residue_carries_into_detected() {
        // Two below-threshold blips while Active leave the counter at 2;
        // the transition into Detected does not clear it, so a single
        // further below-threshold tick ends the detection.
        let mut data = SensorStateData::new();
        for t in [0, 100, 200] {
            tick(&mut data, ABOVE, t);
        }
        tick(&mut data, BELOW, 300);
        tick(&mut data, BELOW, 400);
        assert_eq!(data.state(), SensorState::Active);
        assert_eq!(tick(&mut data, ABOVE, 500), TickOutcome::Started { rate: ABOVE });
        assert_eq!(tick(&mut data, BELOW, 600), TickOutcome::Ended { rate: BELOW });
    }

    fn detected_state() -> SensorStateData {
        let mut data = SensorStateData::new();
        for t in [0, 100, 200, 300, 400] {
            tick(&mut data, ABOVE, t);
        }
        assert_eq!(data.state(), SensorState::Detected);
        data
    }
}
