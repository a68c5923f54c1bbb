// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! ARMOUR - Covert Sensor Access Detection Engine
//!
//! Detects covert access to zero-permission motion sensors (accelerometer,
//! gyroscope, magnetometer) by other applications. The engine registers for
//! the sensors at a known slow rate and watches the delivered sample rate:
//! a sustained rate above the device's profiled minimum means some other
//! process holds a faster registration on the same hardware.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ARMOUR Engine                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  sensor feed ──► Sample Ingest ──► Rate Estimator        │
//! │                        │                 │               │
//! │                 [analysis tick]    State Machine         │
//! │                                  Idle/Active/Detected    │
//! │                                          │               │
//! │                              Event Dispatcher            │
//! │                         rate limit + grouped batches     │
//! │                                  │              │        │
//! │                            host callback    event bus    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Offline, recorded sample logs feed a profiling pipeline that measures
//! the minimum rate the device actually delivers; detection thresholds are
//! derived from it with a small bias.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod analysis;
pub mod config;
pub mod core;
pub mod detection;
pub mod sensors;

// Re-exports for convenience
pub use config::{Config, SharedConfig};
pub use core::{Engine, EngineStatus, EventBus};
pub use detection::{DetectionEvent, DetectionMonitor, EventKind, SensorState};
pub use sensors::{SensorKind, SensorSimulator};

/// ARMOUR version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ARMOUR name
pub const NAME: &str = "ARMOUR";
