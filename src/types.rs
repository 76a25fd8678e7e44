// src/types.rs
//
// Data model shared by every pipeline stage. Tracks are owned by the
// ObjectTracker; everything handed to consumers is a cloned snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type TrackId = u32;

// ============================================================================
// GEOMETRY
// ============================================================================

/// Axis-aligned box in frame pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Longest side in pixels, used as the pixel-to-meter reference.
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

/// One detector output for a single frame. No identity, no depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub class_label: String,
    pub score: f32,
}

impl RawDetection {
    pub fn new(class_label: impl Into<String>, bbox: BoundingBox, score: f32) -> Self {
        Self {
            bbox,
            class_label: class_label.into(),
            score,
        }
    }
}

/// Coarse horizontal zone of an object in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Center,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// Spoken form relative to the observer.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Left => "on your left",
            Self::Center => "ahead",
            Self::Right => "on your right",
        }
    }
}

/// RawDetection enriched with estimated distance and zone.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedDetection {
    pub detection: RawDetection,
    pub distance_m: f32,
    pub direction: Direction,
}

impl AnnotatedDetection {
    pub fn bbox(&self) -> &BoundingBox {
        &self.detection.bbox
    }

    pub fn class_label(&self) -> &str {
        &self.detection.class_label
    }
}

// ============================================================================
// TRACKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Approaching,
    Receding,
    Stationary,
    Lateral,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approaching => "approaching",
            Self::Receding => "receding",
            Self::Stationary => "stationary",
            Self::Lateral => "lateral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Geometry of the previous match, kept for velocity computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorSample {
    pub bbox: BoundingBox,
    pub distance_m: f32,
    pub seen_at_ms: f64,
}

/// A persistent identity for one physical object across frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    pub id: TrackId,
    pub class_label: String,
    pub bbox: BoundingBox,
    pub score: f32,
    pub distance_m: f32,
    pub direction: Direction,
    pub confidence: f32,
    pub created_at_ms: f64,
    pub last_seen_ms: f64,
    pub consecutive_matches: u32,
    pub missed_frames: u32,
    pub stable: bool,
    pub focused: bool,
    pub velocity_mps: Option<f32>,
    pub movement: Option<MovementDirection>,
    pub risk: Option<RiskLevel>,
    pub proximity_warning: bool,
    pub prior: Option<PriorSample>,
}

impl TrackedObject {
    /// Seconds between the prior match and the latest one.
    pub fn elapsed_since_prior_s(&self) -> Option<f32> {
        self.prior
            .map(|p| ((self.last_seen_ms - p.seen_at_ms) / 1000.0) as f32)
    }
}

/// Immutable view of the track set published once per tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub tracks: Arc<[TrackedObject]>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            frame_id: 0,
            timestamp_ms: 0.0,
            tracks: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackedObject> {
        self.tracks.iter().find(|t| t.id == id)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// ALERTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Danger,
}

/// Entry of the bounded alert log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: u64,
    pub track_id: TrackId,
    pub message: String,
    pub severity: Severity,
    pub timestamp_ms: f64,
}

/// What the announcer receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub message: String,
    pub severity: Severity,
    /// Cancel any utterance in progress before speaking this one.
    pub should_interrupt: bool,
}

// ============================================================================
// FRAMES
// ============================================================================

#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: u64,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: f64,
}

impl Frame {
    /// Frame without pixel payload, for detectors that do not read pixels.
    pub fn blank(frame_id: u64, width: u32, height: u32, timestamp_ms: f64) -> Self {
        Self {
            frame_id,
            data: Vec::new(),
            width,
            height,
            timestamp_ms,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
