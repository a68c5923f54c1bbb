// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Configuration module

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::detection::ThresholdProvider;
use crate::sensors::SensorKind;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level
    pub log_level: String,

    /// Directory for recorded sample logs and profiling sessions
    pub data_dir: PathBuf,

    /// Real-time detection tunables
    pub detection: DetectionConfig,

    /// Per-sensor calibration and thresholds
    pub thresholds: ThresholdConfig,

    /// Demo sample-source settings
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: PathBuf::from("./data"),
            detection: DetectionConfig::default(),
            thresholds: ThresholdConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("armour"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Real-time detection tunables.
///
/// Defaults trade detection latency against noise rejection; all of them
/// are runtime configuration rather than constants so deployments can
/// retune without rebuilding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Consecutive agreeing analysis ticks needed to confirm a state
    /// transition in either direction.
    pub confirmation_samples: u32,

    /// Analysis tick period in milliseconds.
    pub analysis_interval_ms: u64,

    /// Minimum time above threshold before a detection is reported.
    /// Suppresses one-off bursts that are unlikely to be another app's
    /// continuous polling.
    pub min_sustained_ms: i64,

    /// Minimum spacing between "usage started" notifications per sensor.
    pub notification_rate_limit_ms: i64,

    /// Window for grouping near-simultaneous multi-sensor detections into
    /// one delivered batch.
    pub grouping_window_ms: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confirmation_samples: 3,
            analysis_interval_ms: 100,
            min_sustained_ms: 200,
            notification_rate_limit_ms: 5000,
            grouping_window_ms: 2000,
        }
    }
}

/// Calibration data for one sensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorThreshold {
    /// Minimum sampling rate the device delivers for the slowest request,
    /// as measured by profiling. Unset until profiling has run.
    pub min_supported_rate: Option<f64>,

    /// Detection threshold in Hz. Rates above this are treated as evidence
    /// of external sensor usage.
    pub threshold_hz: Option<f64>,
}

/// Per-sensor thresholds and the bias used to derive them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Margin added to a profiled minimum rate to form its threshold.
    pub threshold_bias: f64,

    pub accelerometer: SensorThreshold,
    pub gyroscope: SensorThreshold,
    pub magnetometer: SensorThreshold,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold_bias: 0.5,
            accelerometer: SensorThreshold::default(),
            gyroscope: SensorThreshold::default(),
            magnetometer: SensorThreshold::default(),
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self, kind: SensorKind) -> &SensorThreshold {
        match kind {
            SensorKind::Accelerometer => &self.accelerometer,
            SensorKind::Gyroscope => &self.gyroscope,
            SensorKind::Magnetometer => &self.magnetometer,
        }
    }

    pub fn get_mut(&mut self, kind: SensorKind) -> &mut SensorThreshold {
        match kind {
            SensorKind::Accelerometer => &mut self.accelerometer,
            SensorKind::Gyroscope => &mut self.gyroscope,
            SensorKind::Magnetometer => &mut self.magnetometer,
        }
    }

    /// Detection threshold for a sensor, if a valid one is configured.
    pub fn threshold(&self, kind: SensorKind) -> Option<f64> {
        self.get(kind).threshold_hz.filter(|t| *t > 0.0)
    }

    /// Install profiled minimum rates, deriving each threshold as
    /// `min_rate + threshold_bias`. Non-positive rates are ignored so a
    /// failed profiling run can never install a zero threshold.
    pub fn apply_min_rates(&mut self, min_rates: &HashMap<SensorKind, f64>) {
        let threshold_bias = self.threshold_bias;
        for (kind, rate) in min_rates {
            if *rate <= 0.0 {
                continue;
            }
            let entry = self.get_mut(*kind);
            entry.min_supported_rate = Some(*rate);
            entry.threshold_hz = Some(*rate + threshold_bias);
            info!(
                "{}: min supported rate {:.1} Hz, threshold {:.1} Hz",
                kind,
                rate,
                rate + self.threshold_bias
            );
        }
    }

    /// Whether every sensor has a valid profiled minimum rate.
    pub fn calibrated(&self) -> bool {
        SensorKind::ALL
            .iter()
            .all(|kind| self.get(*kind).min_supported_rate.unwrap_or(-1.0) > 0.0)
    }
}

/// Demo sample-source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Baseline delivery rate in Hz, standing in for the slow registration
    /// the engine itself requests.
    pub base_rate_hz: f64,

    /// Delivery rate during a simulated covert-usage burst.
    pub burst_rate_hz: f64,

    /// Seconds of quiet between bursts.
    pub burst_interval_secs: u64,

    /// Seconds each burst lasts.
    pub burst_duration_secs: u64,

    /// Fractional jitter applied to inter-sample spacing.
    pub jitter: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_rate_hz: 5.0,
            burst_rate_hz: 50.0,
            burst_interval_secs: 10,
            burst_duration_secs: 4,
            jitter: 0.05,
        }
    }
}

/// Clone-able shared handle to the live configuration.
///
/// Threshold edits made through the handle are visible to the detection
/// monitor on its next tick; nothing is cached across a session.
#[derive(Clone)]
pub struct SharedConfig(Arc<RwLock<Config>>);

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Config> {
        self.0.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Config> {
        self.0.write()
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.0.read().clone()
    }
}

impl ThresholdProvider for SharedConfig {
    fn threshold(&self, kind: SensorKind) -> Option<f64> {
        self.0.read().thresholds.threshold(kind)
    }
}
