// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Event bus for host-side fan-out of delivered detection events

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::detection::DetectionEvent;

/// Broadcast fan-out of detection events.
///
/// Events arriving here have already cleared the dispatcher's rate limiting
/// and grouping; every subscriber sees exactly what the host callback sees.
/// Lagging subscribers lose oldest events rather than blocking delivery.
pub struct EventBus {
    detection_tx: broadcast::Sender<DetectionEvent>,
    delivered: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (detection_tx, _) = broadcast::channel(capacity);
        Self {
            detection_tx,
            delivered: AtomicU64::new(0),
        }
    }

    pub fn publish_detection(&self, event: DetectionEvent) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        let _ = self.detection_tx.send(event);
    }

    pub fn subscribe_detections(&self) -> broadcast::Receiver<DetectionEvent> {
        self.detection_tx.subscribe()
    }

    /// Total events delivered since construction.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}
