// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Sensor feed simulator for demo/testing
//!
//! Stands in for the OS sensor subsystem: emits monotonic nanosecond sample
//! timestamps for each sensor at a slow baseline rate, with periodic bursts
//! at an elevated rate that mimic another process grabbing the sensors.

use std::time::Duration;

use rand::prelude::*;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use super::{SensorKind, SENSOR_KIND_COUNT};
use crate::analysis::NANOS_PER_SEC;
use crate::config::SimulatorConfig;

/// Simulated sample-timestamp source.
pub struct SensorSimulator {
    config: SimulatorConfig,
    rng: rand::rngs::StdRng,
}

impl SensorSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            rng: rand::rngs::StdRng::from_entropy(),
        }
    }

    /// Delivery rate at the given point of the simulation, honoring the
    /// burst schedule.
    fn current_rate(&self, elapsed: Duration) -> f64 {
        let cycle = self.config.burst_interval_secs + self.config.burst_duration_secs;
        if cycle == 0 || self.config.burst_duration_secs == 0 {
            return self.config.base_rate_hz;
        }
        let position = elapsed.as_secs() % cycle;
        if position >= self.config.burst_interval_secs {
            self.config.burst_rate_hz
        } else {
            self.config.base_rate_hz
        }
    }

    /// Jittered nanosecond spacing to the next sample at `rate_hz`.
    fn next_step_ns(&mut self, rate_hz: f64) -> i64 {
        let spacing = NANOS_PER_SEC / rate_hz.max(0.001);
        let jitter = self.config.jitter.clamp(0.0, 0.9);
        let factor = if jitter > 0.0 {
            1.0 + self.rng.gen_range(-jitter..=jitter)
        } else {
            1.0
        };
        ((spacing * factor) as i64).max(1)
    }

    /// Run the feed until `shutdown` fires, delivering each sample through
    /// `on_sample` the way a sensor callback would.
    pub fn spawn<F>(mut self, on_sample: F, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()>
    where
        F: Fn(SensorKind, i64) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let start = Instant::now();
            let mut next_due = [start; SENSOR_KIND_COUNT];
            let mut timestamps_ns = [0i64; SENSOR_KIND_COUNT];
            let mut in_burst = false;

            loop {
                // Next sensor due to deliver a sample.
                let (index, due) = next_due
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, due)| **due)
                    .map(|(i, due)| (i, *due))
                    .expect("sensor set is non-empty");

                tokio::select! {
                    _ = tokio::time::sleep_until(due) => {
                        let rate = self.current_rate(start.elapsed());
                        let bursting = rate > self.config.base_rate_hz;
                        if bursting != in_burst {
                            in_burst = bursting;
                            if in_burst {
                                info!("Simulating covert sensor access burst");
                            } else {
                                info!("Simulated burst over, back to baseline rate");
                            }
                        }

                        let step = self.next_step_ns(rate);
                        timestamps_ns[index] += step;
                        on_sample(SensorKind::ALL[index], timestamps_ns[index]);
                        next_due[index] = due + Duration::from_nanos(step as u64);
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            base_rate_hz: 5.0,
            burst_rate_hz: 50.0,
            burst_interval_secs: 10,
            burst_duration_secs: 4,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_burst_schedule() {
        let simulator = SensorSimulator::new(config());
        assert_eq!(simulator.current_rate(Duration::from_secs(0)), 5.0);
        assert_eq!(simulator.current_rate(Duration::from_secs(9)), 5.0);
        assert_eq!(simulator.current_rate(Duration::from_secs(10)), 50.0);
        assert_eq!(simulator.current_rate(Duration::from_secs(13)), 50.0);
        // Next cycle.
        assert_eq!(simulator.current_rate(Duration::from_secs(14)), 5.0);
        assert_eq!(simulator.current_rate(Duration::from_secs(24)), 50.0);
    }

    #[test]
    fn test_step_spacing_matches_rate() {
        let mut simulator = SensorSimulator::new(config());
        assert_eq!(simulator.next_step_ns(5.0), 200_000_000);
        assert_eq!(simulator.next_step_ns(50.0), 20_000_000);
    }

    #[test]
    fn test_jittered_steps_stay_positive_and_bounded() {
        let mut simulator = SensorSimulator::new(SimulatorConfig {
            jitter: 0.05,
            ..config()
        });
        for _ in 0..100 {
            let step = simulator.next_step_ns(5.0);
            assert!(step > 0);
            assert!((190_000_000..=210_000_000).contains(&step));
        }
    }

    #[tokio::test]
    async fn test_spawned_feed_emits_monotonic_timestamps() {
        let samples: Arc<Mutex<Vec<(SensorKind, i64)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let simulator = SensorSimulator::new(SimulatorConfig {
            base_rate_hz: 200.0,
            burst_rate_hz: 200.0,
            burst_interval_secs: 0,
            burst_duration_secs: 0,
            jitter: 0.0,
        });
        let handle = simulator.spawn(
            move |kind, ts| sink.lock().push((kind, ts)),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let samples = samples.lock();
        assert!(!samples.is_empty());
        for kind in SensorKind::ALL {
            let series: Vec<i64> = samples
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, ts)| *ts)
                .collect();
            assert!(series.len() >= 2, "{} produced too few samples", kind);
            assert!(series.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
