// src/pipeline/metrics.rs
//
// Counters for every pipeline stage. Clones share the same counters, so a
// host can keep a handle and read it while the session runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub ticks: Arc<AtomicU64>,
    pub frames_not_ready: Arc<AtomicU64>,
    pub inference_requests: Arc<AtomicU64>,
    pub inference_results: Arc<AtomicU64>,
    pub inference_failures: Arc<AtomicU64>,
    pub stale_results: Arc<AtomicU64>,
    pub detections_accepted: Arc<AtomicU64>,
    pub detections_discarded: Arc<AtomicU64>,
    pub tracks_created: Arc<AtomicU64>,
    pub tracks_removed: Arc<AtomicU64>,
    pub alerts_emitted: Arc<AtomicU64>,
    pub alerts_suppressed: Arc<AtomicU64>,
    pub last_update_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(0)),
            frames_not_ready: Arc::new(AtomicU64::new(0)),
            inference_requests: Arc::new(AtomicU64::new(0)),
            inference_results: Arc::new(AtomicU64::new(0)),
            inference_failures: Arc::new(AtomicU64::new(0)),
            stale_results: Arc::new(AtomicU64::new(0)),
            detections_accepted: Arc::new(AtomicU64::new(0)),
            detections_discarded: Arc::new(AtomicU64::new(0)),
            tracks_created: Arc::new(AtomicU64::new(0)),
            tracks_removed: Arc::new(AtomicU64::new(0)),
            alerts_emitted: Arc::new(AtomicU64::new(0)),
            alerts_suppressed: Arc::new(AtomicU64::new(0)),
            last_update_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSummary {
            ticks: load(&self.ticks),
            frames_not_ready: load(&self.frames_not_ready),
            inference_requests: load(&self.inference_requests),
            inference_results: load(&self.inference_results),
            inference_failures: load(&self.inference_failures),
            stale_results: load(&self.stale_results),
            detections_accepted: load(&self.detections_accepted),
            detections_discarded: load(&self.detections_discarded),
            tracks_created: load(&self.tracks_created),
            tracks_removed: load(&self.tracks_removed),
            alerts_emitted: load(&self.alerts_emitted),
            alerts_suppressed: load(&self.alerts_suppressed),
            last_update_us: load(&self.last_update_us),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub ticks: u64,
    pub frames_not_ready: u64,
    pub inference_requests: u64,
    pub inference_results: u64,
    pub inference_failures: u64,
    pub stale_results: u64,
    pub detections_accepted: u64,
    pub detections_discarded: u64,
    pub tracks_created: u64,
    pub tracks_removed: u64,
    pub alerts_emitted: u64,
    pub alerts_suppressed: u64,
    pub last_update_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let handle = metrics.clone();
        metrics.inc(&metrics.ticks);
        metrics.add(&metrics.alerts_emitted, 3);
        let summary = handle.summary();
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.alerts_emitted, 3);
    }
}
