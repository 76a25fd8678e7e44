// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod runtime;
pub mod session;

pub use event_bus::{EventBus, PipelineEvent};
pub use frame_context::FrameContext;
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use runtime::run_session;
pub use session::{DeliveryOutcome, InferenceTicket, Session, SessionState, TickOutput, TickStatus};
