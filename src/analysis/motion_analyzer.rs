// src/analysis/motion_analyzer.rs
//
// Velocity, movement direction and risk from two consecutive matches of the
// same track. Pixel displacement is turned into meters with the rough ratio
// distance / longest box side; the radial part comes from the distance delta.

use crate::types::{BoundingBox, MovementDirection, RiskLevel, TrackedObject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enable_motion_analysis: bool,
    /// |distance delta| below this counts as no radial movement
    pub stationary_threshold_m: f32,
    /// Sideways speed above which a radially still object is `lateral`
    pub lateral_speed_threshold_mps: f32,
    pub risk: RiskThresholds,
    pub proximity: ProximityThresholds,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enable_motion_analysis: true,
            stationary_threshold_m: 0.5,
            lateral_speed_threshold_mps: 0.5,
            risk: RiskThresholds::default(),
            proximity: ProximityThresholds::default(),
        }
    }
}

/// Each level fires when distance is below `*_distance_m` and speed above `*_speed_mps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub critical_distance_m: f32,
    pub critical_speed_mps: f32,
    pub high_distance_m: f32,
    pub high_speed_mps: f32,
    pub medium_distance_m: f32,
    pub medium_speed_mps: f32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical_distance_m: 2.0,
            critical_speed_mps: 2.0,
            high_distance_m: 3.0,
            high_speed_mps: 1.5,
            medium_distance_m: 5.0,
            medium_speed_mps: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityThresholds {
    /// Anything closer is a warning regardless of motion
    pub immediate_m: f32,
    pub approaching_m: f32,
    pub approaching_speed_mps: f32,
    pub fast_m: f32,
    pub fast_speed_mps: f32,
}

impl Default for ProximityThresholds {
    fn default() -> Self {
        Self {
            immediate_m: 1.5,
            approaching_m: 2.5,
            approaching_speed_mps: 1.0,
            fast_m: 3.0,
            fast_speed_mps: 2.0,
        }
    }
}

/// Previous and current geometry of one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub previous_bbox: BoundingBox,
    pub previous_distance_m: f32,
    pub current_bbox: BoundingBox,
    pub current_distance_m: f32,
    pub elapsed_s: f32,
}

impl MotionSample {
    pub fn from_track(track: &TrackedObject) -> Option<Self> {
        let prior = track.prior?;
        Some(Self {
            previous_bbox: prior.bbox,
            previous_distance_m: prior.distance_m,
            current_bbox: track.bbox,
            current_distance_m: track.distance_m,
            elapsed_s: track.elapsed_since_prior_s()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    pub velocity_mps: f32,
    pub movement: MovementDirection,
    pub risk: RiskLevel,
    pub proximity_warning: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MotionAnalyzer {
    pub config: MotionConfig,
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable_motion_analysis
    }

    /// Without a prior sample the object is treated as still.
    pub fn analyze(&self, sample: Option<&MotionSample>, distance_m: f32) -> MotionEstimate {
        let (velocity_mps, movement) = match sample {
            Some(s) if s.elapsed_s > 0.0 => self.kinematics(s),
            _ => (0.0, MovementDirection::Stationary),
        };

        MotionEstimate {
            velocity_mps,
            movement,
            risk: self.risk_level(distance_m, velocity_mps),
            proximity_warning: self.proximity_warning(distance_m, velocity_mps, movement),
        }
    }

    fn kinematics(&self, s: &MotionSample) -> (f32, MovementDirection) {
        let (px, py) = s.previous_bbox.center();
        let (cx, cy) = s.current_bbox.center();
        let pixel_displacement = (cx - px).hypot(cy - py);

        let meters_per_pixel = s.current_distance_m / s.current_bbox.max_side().max(1.0);
        let lateral_m = pixel_displacement * meters_per_pixel;
        let radial_m = s.current_distance_m - s.previous_distance_m;

        let velocity = lateral_m.hypot(radial_m) / s.elapsed_s;
        let lateral_speed = lateral_m / s.elapsed_s;

        let threshold = self.config.stationary_threshold_m;
        let movement = if radial_m <= -threshold {
            MovementDirection::Approaching
        } else if radial_m >= threshold {
            MovementDirection::Receding
        } else if lateral_speed > self.config.lateral_speed_threshold_mps {
            MovementDirection::Lateral
        } else {
            MovementDirection::Stationary
        };

        (velocity, movement)
    }

    pub fn risk_level(&self, distance_m: f32, velocity_mps: f32) -> RiskLevel {
        let r = &self.config.risk;
        if distance_m < r.critical_distance_m && velocity_mps > r.critical_speed_mps {
            RiskLevel::Critical
        } else if distance_m < r.high_distance_m && velocity_mps > r.high_speed_mps {
            RiskLevel::High
        } else if distance_m < r.medium_distance_m && velocity_mps > r.medium_speed_mps {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn proximity_warning(
        &self,
        distance_m: f32,
        velocity_mps: f32,
        movement: MovementDirection,
    ) -> bool {
        let p = &self.config.proximity;
        distance_m < p.immediate_m
            || (distance_m < p.approaching_m
                && movement == MovementDirection::Approaching
                && velocity_mps > p.approaching_speed_mps)
            || (distance_m < p.fast_m && velocity_mps > p.fast_speed_mps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(prev_d: f32, cur_d: f32, dx: f32, elapsed_s: f32) -> MotionSample {
        MotionSample {
            previous_bbox: BoundingBox::new(300.0, 100.0, 100.0, 200.0),
            previous_distance_m: prev_d,
            current_bbox: BoundingBox::new(300.0 + dx, 100.0, 100.0, 200.0),
            current_distance_m: cur_d,
            elapsed_s,
        }
    }

    #[test]
    fn test_fast_approach_is_critical() {
        let analyzer = MotionAnalyzer::default();
        let est = analyzer.analyze(Some(&sample(4.0, 1.8, 0.0, 0.5)), 1.8);
        assert_eq!(est.movement, MovementDirection::Approaching);
        assert!((est.velocity_mps - 4.4).abs() < 0.01);
        assert_eq!(est.risk, RiskLevel::Critical);
        assert!(est.proximity_warning);
    }

    #[test]
    fn test_receding() {
        let analyzer = MotionAnalyzer::default();
        let est = analyzer.analyze(Some(&sample(3.0, 4.0, 0.0, 0.5)), 4.0);
        assert_eq!(est.movement, MovementDirection::Receding);
        assert_eq!(est.risk, RiskLevel::Medium);
        assert!(!est.proximity_warning);
    }

    #[test]
    fn test_lateral_movement() {
        let analyzer = MotionAnalyzer::default();
        // 100px sideways at 4m with a 200px box: 2m in 1s
        let est = analyzer.analyze(Some(&sample(4.0, 4.0, 100.0, 1.0)), 4.0);
        assert_eq!(est.movement, MovementDirection::Lateral);
        assert!((est.velocity_mps - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_small_jitter_is_stationary() {
        let analyzer = MotionAnalyzer::default();
        let est = analyzer.analyze(Some(&sample(6.0, 6.1, 2.0, 0.5)), 6.1);
        assert_eq!(est.movement, MovementDirection::Stationary);
        assert_eq!(est.risk, RiskLevel::Low);
    }

    #[test]
    fn test_zero_elapsed_gives_zero_velocity() {
        let analyzer = MotionAnalyzer::default();
        let est = analyzer.analyze(Some(&sample(4.0, 1.0, 50.0, 0.0)), 1.0);
        assert_eq!(est.velocity_mps, 0.0);
        // Still too close
        assert!(est.proximity_warning);
    }

    #[test]
    fn test_no_prior_sample() {
        let analyzer = MotionAnalyzer::default();
        let est = analyzer.analyze(None, 8.0);
        assert_eq!(est.velocity_mps, 0.0);
        assert_eq!(est.movement, MovementDirection::Stationary);
        assert_eq!(est.risk, RiskLevel::Low);
        assert!(!est.proximity_warning);
    }

    #[test]
    fn test_risk_levels() {
        let analyzer = MotionAnalyzer::default();
        assert_eq!(analyzer.risk_level(1.9, 2.5), RiskLevel::Critical);
        assert_eq!(analyzer.risk_level(2.5, 2.5), RiskLevel::High);
        assert_eq!(analyzer.risk_level(2.5, 1.6), RiskLevel::High);
        assert_eq!(analyzer.risk_level(4.0, 1.2), RiskLevel::Medium);
        assert_eq!(analyzer.risk_level(4.0, 0.8), RiskLevel::Low);
        assert_eq!(analyzer.risk_level(10.0, 9.0), RiskLevel::Low);
    }

    #[test]
    fn test_proximity_rules() {
        let analyzer = MotionAnalyzer::default();
        assert!(analyzer.proximity_warning(1.4, 0.0, MovementDirection::Stationary));
        assert!(analyzer.proximity_warning(2.4, 1.2, MovementDirection::Approaching));
        assert!(!analyzer.proximity_warning(2.4, 1.2, MovementDirection::Receding));
        assert!(analyzer.proximity_warning(2.9, 2.1, MovementDirection::Lateral));
        assert!(!analyzer.proximity_warning(3.5, 5.0, MovementDirection::Approaching));
    }
}
