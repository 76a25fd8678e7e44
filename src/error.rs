// src/error.rs

use thiserror::Error;

/// Errors surfaced to whoever owns a Session.
///
/// Only `Acquisition` and `DetectorLost` end a running session; everything
/// that happens inside a tick is logged and absorbed.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame source could not be opened: {0}")]
    Acquisition(String),

    #[error("session is not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("detector worker failed: {0}")]
    DetectorLost(String),
}

impl SessionError {
    pub fn acquisition<S: Into<String>>(msg: S) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Why a single raw detection was dropped before tracking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionRejection {
    #[error("score {score:.2} below minimum {min:.2}")]
    LowScore { score: f32, min: f32 },

    #[error("non-positive box size {width}x{height}")]
    NonPositiveSize { width: f32, height: f32 },

    #[error("box [{x}, {y}, {right}, {bottom}] outside {frame_width}x{frame_height} frame")]
    OutOfFrame {
        x: f32,
        y: f32,
        right: f32,
        bottom: f32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("non-finite box coordinates or score")]
    NonFinite,
}
