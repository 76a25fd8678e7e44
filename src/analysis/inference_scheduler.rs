// src/analysis/inference_scheduler.rs
//
// Decides when the detector may run. Inference is slower than the render
// tick, so at most one request is in flight and new requests are throttled
// to a minimum interval; ticks in between reuse the last result set.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum time between two detector requests
    pub min_interval_ms: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 175.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Start request `id` now
    Run(u64),
    /// A request is still pending
    InFlight,
    /// Too soon after the previous request
    Throttled,
}

pub struct InferenceScheduler {
    config: SchedulerConfig,
    in_flight: Option<u64>,
    last_request_ms: Option<f64>,
    next_request_id: u64,
    total_ticks: u64,
    invocations: u64,
    skipped_in_flight: u64,
    skipped_throttled: u64,
}

impl InferenceScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            in_flight: None,
            last_request_ms: None,
            next_request_id: 1,
            total_ticks: 0,
            invocations: 0,
            skipped_in_flight: 0,
            skipped_throttled: 0,
        }
    }

    pub fn decide(&mut self, now_ms: f64) -> ScheduleDecision {
        self.total_ticks += 1;

        if self.in_flight.is_some() {
            self.skipped_in_flight += 1;
            return ScheduleDecision::InFlight;
        }

        if let Some(last) = self.last_request_ms {
            if now_ms - last < self.config.min_interval_ms {
                self.skipped_throttled += 1;
                return ScheduleDecision::Throttled;
            }
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some(id);
        self.last_request_ms = Some(now_ms);
        self.invocations += 1;
        debug!("Inference request {} scheduled at {:.0}ms", id, now_ms);
        ScheduleDecision::Run(id)
    }

    /// Close request `id`. False when it is not the pending one (stale or
    /// already completed); its result must then be discarded.
    pub fn complete(&mut self, id: u64) -> bool {
        if self.in_flight == Some(id) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn get_stats(&self) -> SchedulerStats {
        SchedulerStats {
            total_ticks: self.total_ticks,
            invocations: self.invocations,
            skipped_in_flight: self.skipped_in_flight,
            skipped_throttled: self.skipped_throttled,
            invocation_rate: if self.total_ticks > 0 {
                self.invocations as f32 / self.total_ticks as f32
            } else {
                0.0
            },
        }
    }

    /// Forget the pending request and the throttle clock. Request ids keep
    /// increasing so a late result from before the reset is still stale.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.last_request_ms = None;
        self.total_ticks = 0;
        self.invocations = 0;
        self.skipped_in_flight = 0;
        self.skipped_throttled = 0;
    }
}

impl Default for InferenceScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub total_ticks: u64,
    pub invocations: u64,
    pub skipped_in_flight: u64,
    pub skipped_throttled: u64,
    pub invocation_rate: f32,
}
