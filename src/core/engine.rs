// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Main engine - host-facing facade over the detection core

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::SharedConfig;
use crate::detection::{DetectionCallback, DetectionEvent, DetectionMonitor};
use crate::sensors::SensorKind;

use super::EventBus;

/// Engine status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub events_delivered: u64,
    /// Sensor display name -> current detection state name.
    pub sensors: BTreeMap<String, String>,
}

/// Host-facing facade wiring configuration, the detection monitor, and the
/// event bus together.
///
/// Every event the monitor delivers is published on the bus; an optional
/// host callback supplied at construction additionally receives each event
/// on the analysis-tick context.
pub struct Engine {
    config: SharedConfig,
    event_bus: Arc<EventBus>,
    monitor: Arc<DetectionMonitor>,
}

impl Engine {
    pub fn new(config: SharedConfig) -> Self {
        Self::with_callback(config, None)
    }

    pub fn with_callback(config: SharedConfig, callback: Option<DetectionCallback>) -> Self {
        let event_bus = Arc::new(EventBus::new(64));

        let bus = Arc::clone(&event_bus);
        let deliver: DetectionCallback = Box::new(move |event: DetectionEvent| {
            bus.publish_detection(event.clone());
            if let Some(host) = &callback {
                host(event);
            }
        });

        let monitor = DetectionMonitor::new(
            config.read().detection.clone(),
            Arc::new(config.clone()),
            deliver,
        );

        Self {
            config,
            event_bus,
            monitor,
        }
    }

    /// Start detection. No-op when already running.
    pub async fn start(&self) {
        info!("Starting ARMOUR engine");
        self.monitor.start().await;
    }

    /// Stop detection, reporting the end of any usage still in progress.
    /// No-op when not running.
    pub async fn stop(&self) {
        info!("Stopping ARMOUR engine");
        self.monitor.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }

    /// Forward one raw sample timestamp from the sensor subsystem.
    pub fn on_sensor_timestamp(&self, sensor: SensorKind, timestamp_ns: i64) {
        self.monitor.on_sensor_timestamp(sensor, timestamp_ns);
    }

    /// Status snapshot; safe from any thread, never mutates.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.monitor.is_running(),
            events_delivered: self.event_bus.delivered_count(),
            sensors: self.monitor.status(),
        }
    }

    /// Subscribe to delivered detection events.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.event_bus.subscribe_detections()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }
}
