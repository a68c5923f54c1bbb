// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Detection coordinator - lifecycle, analysis loop, status

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::state_machine::{SensorStateData, TickOutcome};
use super::{DetectionCallback, DetectionEvent, EventDispatcher, EventKind, SensorState, ThresholdProvider};
use crate::analysis;
use crate::config::DetectionConfig;
use crate::core::{Clock, SystemClock};
use crate::sensors::{SensorKind, SENSOR_KIND_COUNT};

/// Real-time detection coordinator.
///
/// Owns one state machine per sensor, runs the periodic analysis loop, and
/// feeds reportable transitions to the event dispatcher. Sample timestamps
/// arrive from whatever thread the sensor subsystem uses; each sensor's
/// state sits behind its own lock, held only for the append or for one
/// analysis step, so ingestion never blocks on another sensor's analysis.
pub struct DetectionMonitor {
    config: DetectionConfig,
    thresholds: Arc<dyn ThresholdProvider>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
    sensors: [Mutex<SensorStateData>; SENSOR_KIND_COUNT],
    dispatcher: Mutex<EventDispatcher>,
    tick_task: tokio::sync::Mutex<TickTask>,
    /// Self-handle for the spawned tick task.
    weak_self: Weak<DetectionMonitor>,
}

#[derive(Default)]
struct TickTask {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl DetectionMonitor {
    /// Build a monitor delivering events to `callback` from the analysis
    /// context. The callback must not block.
    pub fn new(
        config: DetectionConfig,
        thresholds: Arc<dyn ThresholdProvider>,
        callback: DetectionCallback,
    ) -> Arc<Self> {
        Self::with_clock(config, thresholds, Arc::new(SystemClock), callback)
    }

    pub fn with_clock(
        config: DetectionConfig,
        thresholds: Arc<dyn ThresholdProvider>,
        clock: Arc<dyn Clock>,
        callback: DetectionCallback,
    ) -> Arc<Self> {
        let dispatcher = EventDispatcher::new(&config, callback);
        Arc::new_cyclic(|weak_self| Self {
            config,
            thresholds,
            clock,
            running: AtomicBool::new(false),
            sensors: std::array::from_fn(|_| Mutex::new(SensorStateData::new())),
            dispatcher: Mutex::new(dispatcher),
            tick_task: tokio::sync::Mutex::new(TickTask::default()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the analysis loop. No-op when already running.
    pub async fn start(&self) {
        let Some(monitor) = self.weak_self.upgrade() else {
            return;
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Starting realtime detection");

        // Per-session state begins fresh.
        for slot in &self.sensors {
            *slot.lock() = SensorStateData::new();
        }
        self.dispatcher.lock().reset();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = Duration::from_millis(self.config.analysis_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !monitor.running.load(Ordering::SeqCst) {
                            break;
                        }
                        monitor.analysis_pass();
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        let mut task = self.tick_task.lock().await;
        task.handle = Some(handle);
        task.shutdown = Some(shutdown_tx);
    }

    /// Stop the analysis loop, report the end of any detection still in
    /// progress, and discard per-session state. No-op when not running.
    ///
    /// The tick task is cancelled and awaited before teardown, so no stale
    /// tick can fire once this returns.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping realtime detection");

        let (handle, shutdown) = {
            let mut task = self.tick_task.lock().await;
            (task.handle.take(), task.shutdown.take())
        };
        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // Observers must not be left believing usage is ongoing. Pending
        // grouped starts are dropped, not flushed.
        self.end_active_detections();
        self.dispatcher.lock().reset();
        for slot in &self.sensors {
            *slot.lock() = SensorStateData::new();
        }
    }

    /// Ingest one raw sample timestamp (monotonic nanoseconds).
    ///
    /// Safe to call from any thread, concurrently with the analysis loop.
    /// Silently ignored while detection is not running.
    pub fn on_sensor_timestamp(&self, sensor: SensorKind, timestamp_ns: i64) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.sensors[sensor.index()].lock().window.push(timestamp_ns);
    }

    /// Snapshot of each sensor's current state by display name.
    /// Purely observational; empty when not running.
    pub fn status(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if !self.is_running() {
            return map;
        }
        for kind in SensorKind::ALL {
            let state = self.sensors[kind.index()].lock().state();
            map.insert(kind.display_name().to_string(), state.to_string());
        }
        map
    }

    /// One analysis pass over all sensors plus the grouping-deadline check.
    ///
    /// Sensors without a valid rate estimate or threshold are skipped for
    /// the tick; that is expected before calibration, not an error.
    fn analysis_pass(&self) {
        let now_ms = self.clock.now_ms();

        for kind in SensorKind::ALL {
            let threshold = match self.thresholds.threshold(kind) {
                Some(t) if t > 0.0 => t,
                _ => continue,
            };

            // Sensor lock covers exactly one read-evaluate-advance step;
            // dispatch happens after it is released.
            let outcome = {
                let mut data = self.sensors[kind.index()].lock();
                match analysis::window_rate(&data.window) {
                    Some(rate) => data.advance(kind, rate, threshold, now_ms, &self.config),
                    None => continue,
                }
            };

            match outcome {
                TickOutcome::None => {}
                TickOutcome::Started { rate } => {
                    let event =
                        DetectionEvent::new(kind, EventKind::UsageStarted, rate, threshold, now_ms);
                    self.dispatcher.lock().dispatch(event, now_ms);
                }
                TickOutcome::Ended { rate } => {
                    let event =
                        DetectionEvent::new(kind, EventKind::UsageEnded, rate, threshold, now_ms);
                    self.dispatcher.lock().dispatch(event, now_ms);
                }
            }
        }

        self.dispatcher.lock().poll_flush(now_ms);
    }

    /// Emit synthetic end events for sensors still in Detected, bypassing
    /// the rate limiter.
    fn end_active_detections(&self) {
        let now_ms = self.clock.now_ms();
        for kind in SensorKind::ALL {
            let detected = self.sensors[kind.index()].lock().state() == SensorState::Detected;
            if detected {
                let threshold = self.thresholds.threshold(kind).unwrap_or(0.0);
                let event =
                    DetectionEvent::new(kind, EventKind::UsageEnded, 0.0, threshold, now_ms);
                self.dispatcher.lock().deliver_now(event);
            }
        }
    }
}
