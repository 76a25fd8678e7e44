// src/analysis/object_tracker.rs
//
// IoU-based multi-object tracker for per-frame detections.
// Keeps object identity across frames despite missed detections, box jitter
// and label flicker.
//
// Design:
//   - Detections are matched in arrival order; each live track can be claimed
//     by at most one detection per frame (first come, first served)
//   - Same-class candidates only. Eligible when IoU clears the primary
//     threshold, or a lower threshold when the distance estimate agrees
//   - Best candidate = highest IoU, ties go to the smallest distance delta
//   - Unmatched tracks coast: confidence decays, geometry stays put, and the
//     track is dropped at zero confidence or past its grace window
//   - Stable tracks decay slower and get a longer grace window

use crate::analysis::motion_analyzer::{MotionAnalyzer, MotionSample};
use crate::types::{AnnotatedDetection, BoundingBox, PriorSample, TrackId, TrackedObject};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// IoU above which a same-class track is always eligible
    pub iou_match_threshold: f32,
    /// Lower IoU accepted when the distance estimate also agrees
    pub secondary_iou_threshold: f32,
    /// Max |distance delta| in meters for the secondary rule
    pub distance_tolerance_m: f32,
    /// Confidence of a freshly created track
    pub initial_confidence: f32,
    /// Confidence gained per match (capped at 1.0)
    pub confidence_increment: f32,
    /// Confidence lost per frame without a match
    pub confidence_decay_rate: f32,
    /// Multiplier on the decay rate once a track is stable
    pub stable_decay_factor: f32,
    /// Consecutive matches required before a track is stable
    pub stability_frame_count: u32,
    /// Time an unstable track survives without a match
    pub track_grace_window_ms: f64,
    /// Time a stable track survives without a match
    pub stable_grace_window_ms: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_match_threshold: 0.25,
            secondary_iou_threshold: 0.15,
            distance_tolerance_m: 2.0,
            initial_confidence: 0.55,
            confidence_increment: 0.15,
            confidence_decay_rate: 0.1,
            stable_decay_factor: 0.5,
            stability_frame_count: 2,
            track_grace_window_ms: 1000.0,
            stable_grace_window_ms: 2000.0,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    ConfidenceExhausted,
    GraceExpired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedTrack {
    pub id: TrackId,
    pub class_label: String,
    pub reason: RemovalReason,
}

/// What one update cycle did to the live set.
#[derive(Debug, Clone, Default)]
pub struct TrackerUpdate {
    pub matched: Vec<TrackId>,
    pub created: Vec<TrackId>,
    pub removed: Vec<RemovedTrack>,
}

impl TrackerUpdate {
    /// Tracks that received fresh geometry this frame.
    pub fn touched(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.matched.iter().chain(self.created.iter()).copied()
    }
}

impl TrackedObject {
    fn spawn(id: TrackId, det: &AnnotatedDetection, timestamp_ms: f64, confidence: f32) -> Self {
        Self {
            id,
            class_label: det.class_label().to_string(),
            bbox: *det.bbox(),
            score: det.detection.score,
            distance_m: det.distance_m,
            direction: det.direction,
            confidence: confidence.clamp(0.0, 1.0),
            created_at_ms: timestamp_ms,
            last_seen_ms: timestamp_ms,
            consecutive_matches: 1,
            missed_frames: 0,
            stable: false,
            focused: false,
            velocity_mps: None,
            movement: None,
            risk: None,
            proximity_warning: false,
            prior: None,
        }
    }

    fn absorb(&mut self, det: &AnnotatedDetection, timestamp_ms: f64, cfg: &TrackerConfig) {
        self.prior = Some(PriorSample {
            bbox: self.bbox,
            distance_m: self.distance_m,
            seen_at_ms: self.last_seen_ms,
        });
        self.bbox = *det.bbox();
        self.score = det.detection.score;
        self.distance_m = det.distance_m;
        self.direction = det.direction;
        self.confidence = (self.confidence + cfg.confidence_increment).min(1.0);
        self.consecutive_matches += 1;
        self.missed_frames = 0;
        self.last_seen_ms = timestamp_ms;

        if !self.stable && self.consecutive_matches >= cfg.stability_frame_count {
            self.stable = true;
            debug!(
                "Track {} ({}) stable after {} matches",
                self.id, self.class_label, self.consecutive_matches
            );
        }
    }

    fn mark_missed(&mut self, cfg: &TrackerConfig) {
        let rate = if self.stable {
            cfg.confidence_decay_rate * cfg.stable_decay_factor
        } else {
            cfg.confidence_decay_rate
        };
        self.confidence = (self.confidence - rate).max(0.0);
        self.consecutive_matches = 0;
        self.missed_frames += 1;
    }

    fn grace_window_ms(&self, cfg: &TrackerConfig) -> f64 {
        if self.stable {
            cfg.stable_grace_window_ms
        } else {
            cfg.track_grace_window_ms
        }
    }

    fn removal_reason(&self, timestamp_ms: f64, cfg: &TrackerConfig) -> Option<RemovalReason> {
        if self.confidence <= 0.0 {
            Some(RemovalReason::ConfidenceExhausted)
        } else if timestamp_ms - self.last_seen_ms > self.grace_window_ms(cfg) {
            Some(RemovalReason::GraceExpired)
        } else {
            None
        }
    }
}

// ============================================================================
// IoU COMPUTATION
// ============================================================================

pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }

    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Render/announce priority: focused, stable, confidence, recency.
pub fn display_order(a: &TrackedObject, b: &TrackedObject) -> Ordering {
    b.focused
        .cmp(&a.focused)
        .then_with(|| b.stable.cmp(&a.stable))
        .then_with(|| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            b.last_seen_ms
                .partial_cmp(&a.last_seen_ms)
                .unwrap_or(Ordering::Equal)
        })
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct ObjectTracker {
    pub config: TrackerConfig,
    tracks: Vec<TrackedObject>,
    next_id: TrackId,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
        }
    }

    /// Merge one frame of annotated detections into the live set.
    pub fn update(&mut self, detections: &[AnnotatedDetection], timestamp_ms: f64) -> TrackerUpdate {
        let mut result = TrackerUpdate::default();

        // Only tracks alive at the start of the frame are candidates.
        let mut claimed = vec![false; self.tracks.len()];

        for det in detections {
            match self.best_candidate(det, &claimed) {
                Some(ti) => {
                    claimed[ti] = true;
                    let track = &mut self.tracks[ti];
                    track.absorb(det, timestamp_ms, &self.config);
                    result.matched.push(track.id);
                }
                None => {
                    let track = TrackedObject::spawn(
                        self.next_id,
                        det,
                        timestamp_ms,
                        self.config.initial_confidence,
                    );
                    info!(
                        "New track T{} created: class={}, distance={:.1}m, zone={}",
                        track.id,
                        track.class_label,
                        track.distance_m,
                        track.direction.as_str()
                    );
                    result.created.push(track.id);
                    self.next_id = self.next_id.wrapping_add(1).max(1);
                    self.tracks.push(track);
                }
            }
        }

        for (ti, was_claimed) in claimed.iter().enumerate() {
            if !was_claimed {
                self.tracks[ti].mark_missed(&self.config);
            }
        }

        result.removed = self.prune(timestamp_ms);
        result
    }

    /// Drop tracks past their grace window without touching confidence.
    /// Used on ticks that carry no new detections.
    pub fn expire(&mut self, timestamp_ms: f64) -> Vec<RemovedTrack> {
        self.prune(timestamp_ms)
    }

    /// Fill velocity / movement / risk for the given tracks.
    pub fn annotate_motion(&mut self, ids: &[TrackId], analyzer: &MotionAnalyzer) {
        for track in self.tracks.iter_mut().filter(|t| ids.contains(&t.id)) {
            let sample = MotionSample::from_track(track);
            let estimate = analyzer.analyze(sample.as_ref(), track.distance_m);
            track.velocity_mps = Some(estimate.velocity_mps);
            track.movement = Some(estimate.movement);
            track.risk = Some(estimate.risk);
            track.proximity_warning = estimate.proximity_warning;
        }
    }

    /// Focus one track, clearing focus elsewhere. False if the id is not live.
    pub fn set_focus(&mut self, id: TrackId) -> bool {
        if !self.tracks.iter().any(|t| t.id == id) {
            return false;
        }
        for track in &mut self.tracks {
            track.focused = track.id == id;
        }
        true
    }

    pub fn clear_focus(&mut self) {
        for track in &mut self.tracks {
            track.focused = false;
        }
    }

    /// Live tracks in display order.
    pub fn ordered(&self) -> Vec<TrackedObject> {
        let mut tracks = self.tracks.clone();
        tracks.sort_by(display_order);
        tracks
    }

    pub fn all_tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    pub fn get_track(&self, id: TrackId) -> Option<&TrackedObject> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn stable_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.stable).count()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    fn best_candidate(&self, det: &AnnotatedDetection, claimed: &[bool]) -> Option<usize> {
        let cfg = &self.config;
        let mut best: Option<(usize, f32, f32)> = None;

        for (ti, track) in self.tracks[..claimed.len()].iter().enumerate() {
            if claimed[ti] || track.class_label != det.class_label() {
                continue;
            }

            let overlap = iou(&track.bbox, det.bbox());
            let delta = (track.distance_m - det.distance_m).abs();
            let eligible = overlap > cfg.iou_match_threshold
                || (overlap > cfg.secondary_iou_threshold && delta < cfg.distance_tolerance_m);
            if !eligible {
                continue;
            }

            let better = match best {
                None => true,
                Some((_, best_iou, best_delta)) => {
                    overlap > best_iou || (overlap == best_iou && delta < best_delta)
                }
            };
            if better {
                best = Some((ti, overlap, delta));
            }
        }

        best.map(|(ti, _, _)| ti)
    }

    fn prune(&mut self, timestamp_ms: f64) -> Vec<RemovedTrack> {
        let cfg = &self.config;
        let mut removed = Vec::new();
        self.tracks.retain(|t| match t.removal_reason(timestamp_ms, cfg) {
            Some(reason) => {
                info!(
                    "Track T{} ({}) removed: {:?} after {} missed frames",
                    t.id, t.class_label, reason, t.missed_frames
                );
                removed.push(RemovedTrack {
                    id: t.id,
                    class_label: t.class_label.clone(),
                    reason,
                });
                false
            }
            None => true,
        });
        removed
    }
}

// ============================================================================
// TESTS
// ============================================================================
