// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Detection event delivery - rate limiting and grouped notification

use tracing::debug;

use super::{DetectionEvent, EventKind};
use crate::config::DetectionConfig;
use crate::sensors::SENSOR_KIND_COUNT;

/// Host notification callback, invoked from the analysis-tick context.
///
/// Implementations must not block; hop threads on the host side if the
/// notification path is slow.
pub type DetectionCallback = Box<dyn Fn(DetectionEvent) + Send + Sync + 'static>;

/// Delivers detection events to the registered callback.
///
/// `UsageEnded` events are forwarded immediately and unconditionally; they
/// are rare and always informative. `UsageStarted` events are per-sensor
/// rate limited, then buffered so that several sensors crossing threshold
/// within the grouping window arrive at the host as one batch. The grouping
/// deadline is a self-deadline checked from the analysis tick, not a
/// separate timer.
pub struct EventDispatcher {
    callback: DetectionCallback,
    rate_limit_ms: i64,
    grouping_window_ms: i64,
    /// Last accepted `UsageStarted` per sensor; dropped events do not
    /// advance the limiter.
    last_started_ms: [Option<i64>; SENSOR_KIND_COUNT],
    pending: Vec<DetectionEvent>,
    flush_deadline_ms: Option<i64>,
}

impl EventDispatcher {
    pub fn new(config: &DetectionConfig, callback: DetectionCallback) -> Self {
        Self {
            callback,
            rate_limit_ms: config.notification_rate_limit_ms,
            grouping_window_ms: config.grouping_window_ms,
            last_started_ms: [None; SENSOR_KIND_COUNT],
            pending: Vec::new(),
            flush_deadline_ms: None,
        }
    }

    /// Route one event produced by the state machine.
    pub fn dispatch(&mut self, event: DetectionEvent, now_ms: i64) {
        match event.kind {
            EventKind::UsageEnded => self.deliver(event),
            EventKind::UsageStarted => {
                let slot = &mut self.last_started_ms[event.sensor.index()];
                if let Some(last) = *slot {
                    if now_ms - last < self.rate_limit_ms {
                        debug!("{} start notification rate limited", event.sensor);
                        return;
                    }
                }
                *slot = Some(now_ms);

                // Every addition restarts the grouping window, so a burst
                // of sensors lighting up together flushes as one batch.
                self.pending.push(event);
                self.flush_deadline_ms = Some(now_ms + self.grouping_window_ms);
            }
        }
    }

    /// Flush the pending batch if its grouping deadline has passed.
    /// Called once per analysis tick.
    pub fn poll_flush(&mut self, now_ms: i64) {
        if let Some(deadline) = self.flush_deadline_ms {
            if now_ms >= deadline {
                self.flush_pending();
            }
        }
    }

    /// Deliver bypassing both the rate limiter and the grouping buffer.
    /// Used for the synthetic end events emitted at teardown.
    pub fn deliver_now(&self, event: DetectionEvent) {
        self.deliver(event);
    }

    /// Drop any buffered start events without delivering them.
    pub fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("discarding {} pending grouped events", self.pending.len());
        }
        self.pending.clear();
        self.flush_deadline_ms = None;
    }

    /// Forget all per-session delivery state.
    pub fn reset(&mut self) {
        self.discard_pending();
        self.last_started_ms = [None; SENSOR_KIND_COUNT];
    }

    fn flush_pending(&mut self) {
        self.flush_deadline_ms = None;
        if self.pending.is_empty() {
            return;
        }
        debug!("flushing {} grouped detection events", self.pending.len());
        for event in self.pending.drain(..) {
            (self.callback)(event);
        }
    }

    fn deliver(&self, event: DetectionEvent) {
        (self.callback)(event);
    }
}
