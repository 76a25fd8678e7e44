// src/estimation/distance.rs
//
// Monocular distance from apparent size: distance = real_size * focal / pixels.
// Upright objects use their height; everything else takes the nearer of the
// width and height estimates.

use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Focal length in pixels for a typical phone sensor at 640px width.
pub const DEFAULT_FOCAL_LENGTH_PX: f32 = 650.0;

/// Mobile cameras overestimate distance systematically.
pub const DEFAULT_CORRECTION_FACTOR: f32 = 0.7;

/// Classes whose height is a steadier cue than their width.
const HEIGHT_CUE_CLASSES: &[&str] = &[
    "person",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "bottle",
    "wine glass",
    "cup",
    "vase",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "refrigerator",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "traffic light",
];

/// Typical real-world footprint (meters) of COCO classes.
const BUILTIN_SIZES: &[(&str, f32, f32)] = &[
    ("person", 0.5, 1.7),
    ("bicycle", 1.7, 1.0),
    ("car", 1.8, 1.5),
    ("motorcycle", 2.0, 1.1),
    ("bus", 2.5, 3.2),
    ("truck", 2.5, 3.0),
    ("traffic light", 0.3, 0.9),
    ("fire hydrant", 0.3, 0.8),
    ("stop sign", 0.75, 0.75),
    ("parking meter", 0.3, 1.4),
    ("bench", 1.5, 0.9),
    ("bird", 0.2, 0.25),
    ("cat", 0.45, 0.3),
    ("dog", 0.7, 0.6),
    ("horse", 2.2, 1.6),
    ("sheep", 1.2, 0.9),
    ("cow", 2.2, 1.5),
    ("elephant", 3.5, 3.0),
    ("bear", 1.8, 1.2),
    ("zebra", 2.2, 1.4),
    ("giraffe", 2.0, 4.5),
    ("backpack", 0.3, 0.45),
    ("umbrella", 1.0, 0.9),
    ("handbag", 0.35, 0.25),
    ("suitcase", 0.45, 0.65),
    ("bottle", 0.08, 0.25),
    ("wine glass", 0.08, 0.2),
    ("cup", 0.08, 0.1),
    ("chair", 0.5, 0.9),
    ("couch", 2.0, 0.9),
    ("potted plant", 0.4, 0.6),
    ("bed", 1.6, 0.6),
    ("dining table", 1.5, 0.75),
    ("toilet", 0.4, 0.75),
    ("tv", 1.0, 0.6),
    ("laptop", 0.35, 0.25),
    ("refrigerator", 0.8, 1.8),
    ("vase", 0.15, 0.3),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSize {
    pub width_m: f32,
    pub height_m: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub min_distance_m: f32,
    pub max_distance_m: f32,
    pub focal_length_px: f32,
    pub correction_factor: f32,
    /// Size assumed for labels missing from the table
    pub default_size: ObjectSize,
    /// Per-label overrides merged over the built-in table
    pub class_sizes: HashMap<String, ObjectSize>,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 0.3,
            max_distance_m: 50.0,
            focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            correction_factor: DEFAULT_CORRECTION_FACTOR,
            default_size: ObjectSize {
                width_m: 0.5,
                height_m: 0.5,
            },
            class_sizes: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    sizes: HashMap<String, ObjectSize>,
    default_size: ObjectSize,
    focal_length_px: f32,
    correction_factor: f32,
    min_distance_m: f32,
    max_distance_m: f32,
}

impl DistanceEstimator {
    pub fn new(config: &DistanceConfig) -> Self {
        let mut sizes: HashMap<String, ObjectSize> = BUILTIN_SIZES
            .iter()
            .map(|&(label, width_m, height_m)| (label.to_string(), ObjectSize { width_m, height_m }))
            .collect();
        for (label, size) in &config.class_sizes {
            sizes.insert(normalize_label(label), *size);
        }

        Self {
            sizes,
            default_size: config.default_size,
            focal_length_px: config.focal_length_px,
            correction_factor: config.correction_factor,
            min_distance_m: config.min_distance_m,
            max_distance_m: config.max_distance_m,
        }
    }

    pub fn known_size(&self, class_label: &str) -> ObjectSize {
        self.sizes
            .get(&normalize_label(class_label))
            .copied()
            .unwrap_or(self.default_size)
    }

    pub fn uses_height_cue(class_label: &str) -> bool {
        let label = normalize_label(class_label);
        HEIGHT_CUE_CLASSES.contains(&label.as_str())
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min_distance_m, self.max_distance_m)
    }

    /// Estimated distance in meters, always inside the configured bounds.
    pub fn estimate(&self, bbox: &BoundingBox, class_label: &str) -> f32 {
        let size = self.known_size(class_label);
        // Sub-pixel boxes would explode the ratio.
        let width_px = bbox.width.max(1.0);
        let height_px = bbox.height.max(1.0);

        let from_width = size.width_m * self.focal_length_px / width_px;
        let from_height = size.height_m * self.focal_length_px / height_px;

        let raw = if Self::uses_height_cue(class_label) {
            from_height
        } else {
            from_width.min(from_height)
        };

        let corrected = raw * self.correction_factor;
        if !corrected.is_finite() {
            return self.max_distance_m;
        }
        corrected.clamp(self.min_distance_m, self.max_distance_m)
    }
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self::new(&DistanceConfig::default())
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
