// src/estimation/mod.rs
//
// Per-detection annotation: sanity checks, then distance and zone.

pub mod direction;
pub mod distance;

pub use direction::DirectionClassifier;
pub use distance::{DistanceConfig, DistanceEstimator, ObjectSize};

use crate::error::DetectionRejection;
use crate::types::{AnnotatedDetection, RawDetection};

#[derive(Debug, Clone)]
pub struct Annotator {
    pub estimator: DistanceEstimator,
    pub classifier: DirectionClassifier,
    pub min_detection_score: f32,
}

impl Annotator {
    pub fn new(estimator: DistanceEstimator, min_detection_score: f32) -> Self {
        Self {
            estimator,
            classifier: DirectionClassifier,
            min_detection_score,
        }
    }

    /// Validate and annotate one raw detection. Rejected detections must
    /// never create or update a track.
    pub fn annotate(
        &self,
        detection: &RawDetection,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<AnnotatedDetection, DetectionRejection> {
        if !detection.score.is_finite() {
            return Err(DetectionRejection::NonFinite);
        }
        if detection.score < self.min_detection_score {
            return Err(DetectionRejection::LowScore {
                score: detection.score,
                min: self.min_detection_score,
            });
        }
        check_geometry(detection, frame_width, frame_height)?;

        let bbox = &detection.bbox;
        Ok(AnnotatedDetection {
            distance_m: self.estimator.estimate(bbox, &detection.class_label),
            direction: self.classifier.classify(bbox, frame_width as f32),
            detection: detection.clone(),
        })
    }
}

fn check_geometry(
    detection: &RawDetection,
    frame_width: u32,
    frame_height: u32,
) -> Result<(), DetectionRejection> {
    let b = &detection.bbox;
    if ![b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite()) {
        return Err(DetectionRejection::NonFinite);
    }
    if b.width <= 0.0 || b.height <= 0.0 {
        return Err(DetectionRejection::NonPositiveSize {
            width: b.width,
            height: b.height,
        });
    }
    if b.x < 0.0 || b.y < 0.0 || b.right() > frame_width as f32 || b.bottom() > frame_height as f32 {
        return Err(DetectionRejection::OutOfFrame {
            x: b.x,
            y: b.y,
            right: b.right(),
            bottom: b.bottom(),
            frame_width,
            frame_height,
        });
    }
    Ok(())
}
