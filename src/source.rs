// src/source.rs
//
// Seams to the outside world: where frames come from and who turns them
// into detections. Real camera and model backends live outside this crate.

use crate::types::{Frame, RawDetection};
use anyhow::Result;

/// Object detector run on one frame at a time.
///
/// Called from a blocking worker thread, so implementations must be `Send`.
/// Boxes are returned in source-frame pixel coordinates.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Used in logs
    fn name(&self) -> &str;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        (**self).detect(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Camera-like frame producer.
pub trait FrameSource {
    /// Acquire the device. Failure here aborts the session before any tick.
    fn open(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Percentage of the source consumed, when known
    fn progress(&self) -> Option<f32> {
        None
    }
}
