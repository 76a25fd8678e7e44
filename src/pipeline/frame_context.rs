// src/pipeline/frame_context.rs
//
// Everything the pipeline learned about one delivered detection batch.
// Built once per inference result so every stage reads the same frame.

use crate::error::DetectionRejection;
use crate::types::AnnotatedDetection;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub raw_count: usize,
    pub detections: Vec<AnnotatedDetection>,
    pub rejected: Vec<DetectionRejection>,
}

impl FrameContext {
    pub fn new(frame_id: u64, timestamp_ms: f64, frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_id,
            timestamp_ms,
            frame_width,
            frame_height,
            raw_count: 0,
            detections: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Rejections other than a low score point at a detector bug.
    pub fn malformed_count(&self) -> usize {
        self.rejected
            .iter()
            .filter(|r| !matches!(r, DetectionRejection::LowScore { .. }))
            .count()
    }

    pub fn nearest(&self) -> Option<&AnnotatedDetection> {
        self.detections
            .iter()
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
    }
}
