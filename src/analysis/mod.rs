// src/analysis/mod.rs
//
// Per-frame analysis stages.
//
// Signal flow:
//   AnnotatedDetections → object_tracker → motion_analyzer → alert_generator → AlertEvents
//   inference_scheduler gates how often new detections arrive at all.

pub mod alert_generator;
pub mod inference_scheduler;
pub mod motion_analyzer;
pub mod object_tracker;

pub use alert_generator::{describe_scene, AlertBatch, AlertConfig, AlertGenerator, AlertKey, AlertKind};
pub use inference_scheduler::{InferenceScheduler, ScheduleDecision, SchedulerConfig, SchedulerStats};
pub use motion_analyzer::{
    MotionAnalyzer, MotionConfig, MotionEstimate, MotionSample, ProximityThresholds, RiskThresholds,
};
pub use object_tracker::{iou, ObjectTracker, RemovalReason, RemovedTrack, TrackerConfig, TrackerUpdate};
