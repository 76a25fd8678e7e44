// src/replay.rs
//
// Scripted scenes: a YAML file lists what the detector "sees" on each frame.
// Used by the replay binary and the scenario tests in place of a camera and
// a model.
//
//   frame_width: 640
//   frame_height: 480
//   frame_interval_ms: 200
//   detector_failures: [4]
//   frames:
//     - hold: 3
//       detections:
//         - { label: person, bbox: [280, 120, 80, 220], score: 0.9 }

use crate::source::{Detector, FrameSource};
use crate::types::{BoundingBox, Frame, RawDetection};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use tracing::info;

fn default_score() -> f32 {
    0.9
}

fn default_hold() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDetection {
    pub label: String,
    /// x, y, width, height in pixels
    pub bbox: [f32; 4],
    #[serde(default = "default_score")]
    pub score: f32,
}

impl SceneDetection {
    fn to_raw(&self) -> RawDetection {
        let [x, y, w, h] = self.bbox;
        RawDetection::new(self.label.clone(), BoundingBox::new(x, y, w, h), self.score)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFrame {
    /// Repeat this frame for several ticks
    #[serde(default = "default_hold")]
    pub hold: u32,
    /// Camera not ready yet (zero-sized frame)
    #[serde(default)]
    pub not_ready: bool,
    #[serde(default)]
    pub detections: Vec<SceneDetection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_interval_ms: f64,
    /// Frame ids (1-based) on which the detector returns an error
    #[serde(default)]
    pub detector_failures: Vec<u64>,
    pub frames: Vec<SceneFrame>,
}

impl Scene {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid scene {}", path.display()))
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let scene: Scene = serde_yaml::from_str(yaml)?;
        if scene.frame_width == 0 || scene.frame_height == 0 {
            bail!(
                "frame size must be positive, got {}x{}",
                scene.frame_width,
                scene.frame_height
            );
        }
        if scene.frame_interval_ms.is_nan() || scene.frame_interval_ms <= 0.0 {
            bail!("frame_interval_ms must be positive");
        }
        Ok(scene)
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.iter().map(|f| f.hold.max(1) as u64).sum()
    }

    /// Expand held frames and split the scene into a source and a detector.
    pub fn into_replay(self) -> (ReplaySource, ReplayDetector) {
        let mut frames = VecDeque::new();
        let mut script = HashMap::new();
        let mut frame_id = 0u64;

        for entry in &self.frames {
            let detections: Vec<RawDetection> =
                entry.detections.iter().map(SceneDetection::to_raw).collect();
            for _ in 0..entry.hold.max(1) {
                frame_id += 1;
                let timestamp_ms = (frame_id - 1) as f64 * self.frame_interval_ms;
                let (w, h) = if entry.not_ready {
                    (0, 0)
                } else {
                    (self.frame_width, self.frame_height)
                };
                frames.push_back(Frame::blank(frame_id, w, h, timestamp_ms));
                script.insert(frame_id, detections.clone());
            }
        }

        let total = frames.len();
        let source = ReplaySource {
            frames,
            total,
            opened: false,
        };
        let detector = ReplayDetector {
            script,
            failures: self.detector_failures.into_iter().collect(),
            calls: 0,
        };
        (source, detector)
    }
}

pub struct ReplaySource {
    frames: VecDeque<Frame>,
    total: usize,
    opened: bool,
}

impl FrameSource for ReplaySource {
    fn open(&mut self) -> Result<()> {
        if self.total == 0 {
            bail!("scene has no frames");
        }
        self.opened = true;
        info!("Replaying {} frames", self.total);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            bail!("replay source read before open");
        }
        Ok(self.frames.pop_front())
    }

    fn progress(&self) -> Option<f32> {
        if self.total == 0 {
            return None;
        }
        Some((self.total - self.frames.len()) as f32 / self.total as f32 * 100.0)
    }
}

pub struct ReplayDetector {
    script: HashMap<u64, Vec<RawDetection>>,
    failures: HashSet<u64>,
    pub calls: u64,
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        if self.failures.contains(&frame.frame_id) {
            bail!("scripted detector failure on frame {}", frame.frame_id);
        }
        Ok(self.script.get(&frame.frame_id).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENE: &str = "
frame_width: 640
frame_height: 480
frame_interval_ms: 100
detector_failures: [3]
frames:
  - not_ready: true
  - hold: 3
    detections:
      - { label: person, bbox: [280, 120, 80, 220] }
      - { label: car, bbox: [10, 200, 120, 90], score: 0.7 }
";

    #[test]
    fn test_held_frames_expand() {
        let scene = Scene::parse(SCENE).unwrap();
        assert_eq!(scene.frame_count(), 4);

        let (mut source, mut detector) = scene.into_replay();
        source.open().unwrap();

        let first = source.read_frame().unwrap().unwrap();
        assert!(!first.is_ready());

        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(second.frame_id, 2);
        assert_eq!(second.timestamp_ms, 100.0);
        let dets = detector.detect(&second).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].score, 0.9);
        assert_eq!(dets[1].bbox.width, 120.0);

        let third = source.read_frame().unwrap().unwrap();
        assert!(detector.detect(&third).is_err());

        source.read_frame().unwrap();
        assert!(source.read_frame().unwrap().is_none());
        assert_eq!(source.progress(), Some(100.0));
    }

    #[test]
    fn test_read_before_open_fails() {
        let (mut source, _) = Scene::parse(SCENE).unwrap().into_replay();
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_empty_scene_fails_to_open() {
        let scene = Scene::parse("frame_width: 640\nframe_height: 480\nframe_interval_ms: 100\nframes: []").unwrap();
        let (mut source, _) = scene.into_replay();
        assert!(source.open().is_err());
    }

    #[test]
    fn test_rejects_zero_frame_size() {
        assert!(Scene::parse("frame_width: 0\nframe_height: 480\nframe_interval_ms: 100\nframes: []").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SCENE}").unwrap();
        let scene = Scene::load(file.path()).unwrap();
        assert_eq!(scene.detector_failures, vec![3]);
    }
}
