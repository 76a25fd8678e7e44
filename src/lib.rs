// src/lib.rs
//
// Detection-to-track pipeline for assistive spatial alerts: distance and
// direction per detection, identity over time, motion and risk, and
// rate-limited spoken alerts.

pub mod analysis;
pub mod config;
pub mod error;
pub mod estimation;
pub mod output;
pub mod pipeline;
pub mod replay;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{DetectionRejection, SessionError};
pub use output::{Announcer, LogAnnouncer, LogRenderer, Renderer};
pub use pipeline::{
    run_session, DeliveryOutcome, InferenceTicket, PipelineEvent, Session, TickOutput, TickStatus,
};
pub use source::{Detector, FrameSource};
pub use types::*;
