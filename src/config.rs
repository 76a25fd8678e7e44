// src/config.rs

use crate::analysis::alert_generator::AlertConfig;
use crate::analysis::inference_scheduler::SchedulerConfig;
use crate::analysis::motion_analyzer::MotionConfig;
use crate::analysis::object_tracker::TrackerConfig;
use crate::error::SessionError;
use crate::estimation::distance::DistanceConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub distance: DistanceConfig,
    pub tracker: TrackerConfig,
    pub motion: MotionConfig,
    pub alerts: AlertConfig,
    pub inference: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Raw detections scoring below this never reach the tracker
    pub min_detection_score: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_detection_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "spatial_alerts=info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), SessionError> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(SessionError::config(format!("{name} must be within [0, 1], got {v}")))
            }
        };

        unit("detection.min_detection_score", self.detection.min_detection_score)?;
        unit("tracker.iou_match_threshold", self.tracker.iou_match_threshold)?;
        unit("tracker.secondary_iou_threshold", self.tracker.secondary_iou_threshold)?;
        unit("tracker.initial_confidence", self.tracker.initial_confidence)?;
        unit("tracker.confidence_increment", self.tracker.confidence_increment)?;
        unit("tracker.confidence_decay_rate", self.tracker.confidence_decay_rate)?;
        unit("tracker.stable_decay_factor", self.tracker.stable_decay_factor)?;

        if self.tracker.secondary_iou_threshold > self.tracker.iou_match_threshold {
            return Err(SessionError::config(
                "tracker.secondary_iou_threshold must not exceed tracker.iou_match_threshold",
            ));
        }
        if self.tracker.confidence_decay_rate <= 0.0 {
            return Err(SessionError::config(
                "tracker.confidence_decay_rate must be positive",
            ));
        }
        if self.tracker.stability_frame_count == 0 {
            return Err(SessionError::config(
                "tracker.stability_frame_count must be at least 1",
            ));
        }
        if self.tracker.track_grace_window_ms <= 0.0 || self.tracker.stable_grace_window_ms <= 0.0 {
            return Err(SessionError::config("tracker grace windows must be positive"));
        }

        let d = &self.distance;
        if !(d.min_distance_m > 0.0 && d.min_distance_m < d.max_distance_m) {
            return Err(SessionError::config(format!(
                "distance bounds must satisfy 0 < min < max, got [{}, {}]",
                d.min_distance_m, d.max_distance_m
            )));
        }
        if d.focal_length_px <= 0.0 || d.correction_factor <= 0.0 {
            return Err(SessionError::config(
                "distance.focal_length_px and distance.correction_factor must be positive",
            ));
        }

        if self.alerts.max_alerts == 0 {
            return Err(SessionError::config("alerts.max_alerts must be at least 1"));
        }
        if self.alerts.alert_cooldown_ms < 0.0 || self.alerts.critical_cooldown_ms < 0.0 {
            return Err(SessionError::config("alert cooldowns must not be negative"));
        }
        if self.inference.min_interval_ms < 0.0 {
            return Err(SessionError::config(
                "inference.min_interval_ms must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "tracker:\n  iou_match_threshold: 0.3\nalerts:\n  alert_cooldown_ms: 3000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!((config.tracker.iou_match_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.alerts.alert_cooldown_ms, 3000.0);
        assert_eq!(config.tracker.stability_frame_count, 2);
        assert!(config.motion.enable_motion_analysis);
    }

    #[test]
    fn test_inverted_distance_bounds_rejected() {
        let mut config = Config::default();
        config.distance.min_distance_m = 60.0;
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_secondary_threshold_above_primary_rejected() {
        let mut config = Config::default();
        config.tracker.secondary_iou_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "detection:\n  min_detection_score: 0.6\ninference:\n  min_interval_ms: 200").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!((config.detection.min_detection_score - 0.6).abs() < 1e-6);
        assert_eq!(config.inference.min_interval_ms, 200.0);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/spatial-alerts.yaml").is_err());
    }
}
