// src/pipeline/session.rs
//
// One detection-to-track session. Driven by an external scheduler:
//
//   tick(frame)            every render tick; may hand out an InferenceTicket
//   deliver(ticket, dets)  when the detector answers; runs the full pipeline
//   stop()                 cancels everything, late results are discarded
//
// All track mutation happens inside deliver()/tick() and ends with a fresh
// Snapshot, so consumers never see a half-updated set.

use crate::analysis::{
    describe_scene, AlertGenerator, InferenceScheduler, MotionAnalyzer, ObjectTracker,
    RemovedTrack, ScheduleDecision,
};
use crate::config::Config;
use crate::error::SessionError;
use crate::estimation::{Annotator, DistanceEstimator};
use crate::pipeline::event_bus::{EventBus, PipelineEvent};
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::metrics::PipelineMetrics;
use crate::types::{Alert, Frame, RawDetection, Snapshot, TrackId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const EVENT_BUS_CAPACITY: usize = 64;
const SCENE_DESCRIPTION_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Frame has no size yet; nothing happened
    FrameNotReady,
    /// A new detector request was issued
    InferenceRequested,
    /// Previous results reused (request pending or throttled)
    Reused,
}

/// Permission to run the detector once on a given frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceTicket {
    pub request_id: u64,
    pub frame_id: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub captured_at_ms: f64,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct TickOutput {
    pub status: TickStatus,
    pub snapshot: Snapshot,
    pub events: Vec<PipelineEvent>,
    pub request: Option<InferenceTicket>,
}

#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Detections went through the pipeline
    Applied {
        snapshot: Snapshot,
        alerts: usize,
        discarded: usize,
    },
    /// Detector failed; track set left as it was
    Failed,
    /// Result belonged to a cancelled or superseded request
    Stale,
}

pub struct Session {
    config: Config,
    annotator: Annotator,
    tracker: ObjectTracker,
    motion: MotionAnalyzer,
    alerts: AlertGenerator,
    scheduler: InferenceScheduler,
    bus: EventBus,
    metrics: PipelineMetrics,
    state: SessionState,
    generation: u64,
    snapshot: Snapshot,
}

impl Session {
    pub fn new(config: Config) -> Result<Self, SessionError> {
        config.validate()?;
        let estimator = DistanceEstimator::new(&config.distance);
        Ok(Self {
            annotator: Annotator::new(estimator, config.detection.min_detection_score),
            tracker: ObjectTracker::new(config.tracker.clone()),
            motion: MotionAnalyzer::new(config.motion.clone()),
            alerts: AlertGenerator::new(config.alerts.clone()),
            scheduler: InferenceScheduler::new(config.inference.clone()),
            bus: EventBus::new(EVENT_BUS_CAPACITY),
            metrics: PipelineMetrics::new(),
            state: SessionState::Running,
            generation: 0,
            snapshot: Snapshot::empty(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    /// Alert log, newest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.alerts.recent().cloned().collect()
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.bus.drain()
    }

    /// Cheap per-tick step. Expires tracks past their grace window and
    /// decides whether the detector should run on this frame.
    pub fn tick(&mut self, frame: &Frame) -> Result<TickOutput, SessionError> {
        if !self.is_running() {
            return Err(SessionError::NotRunning);
        }
        self.metrics.inc(&self.metrics.ticks);

        if !frame.is_ready() {
            self.metrics.inc(&self.metrics.frames_not_ready);
            debug!("Frame {} not ready ({}x{}), skipping tick", frame.frame_id, frame.width, frame.height);
            return Ok(TickOutput {
                status: TickStatus::FrameNotReady,
                snapshot: self.snapshot.clone(),
                events: self.bus.drain(),
                request: None,
            });
        }

        let now = frame.timestamp_ms;
        let removed = self.tracker.expire(now);
        if !removed.is_empty() {
            self.publish_removals(removed);
            self.publish_snapshot(frame.frame_id, now);
        }

        let (status, request) = match self.scheduler.decide(now) {
            ScheduleDecision::Run(request_id) => {
                self.metrics.inc(&self.metrics.inference_requests);
                let ticket = InferenceTicket {
                    request_id,
                    frame_id: frame.frame_id,
                    frame_width: frame.width,
                    frame_height: frame.height,
                    captured_at_ms: now,
                    generation: self.generation,
                };
                (TickStatus::InferenceRequested, Some(ticket))
            }
            ScheduleDecision::InFlight | ScheduleDecision::Throttled => (TickStatus::Reused, None),
        };

        Ok(TickOutput {
            status,
            snapshot: self.snapshot.clone(),
            events: self.bus.drain(),
            request,
        })
    }

    /// Marshal a detector result back into the session. Runs annotation,
    /// tracking, motion analysis and alerting, then publishes a new snapshot.
    pub fn deliver(
        &mut self,
        ticket: InferenceTicket,
        result: anyhow::Result<Vec<RawDetection>>,
    ) -> Result<DeliveryOutcome, SessionError> {
        if ticket.generation != self.generation || !self.scheduler.complete(ticket.request_id) {
            self.metrics.inc(&self.metrics.stale_results);
            debug!("Discarding stale inference result {}", ticket.request_id);
            return Ok(DeliveryOutcome::Stale);
        }
        if !self.is_running() {
            return Err(SessionError::NotRunning);
        }

        let detections = match result {
            Ok(detections) => detections,
            Err(e) => {
                self.metrics.inc(&self.metrics.inference_failures);
                warn!("Detector failed on frame {}: {:#}", ticket.frame_id, e);
                self.bus.publish(PipelineEvent::InferenceFailed {
                    request_id: ticket.request_id,
                    reason: format!("{e:#}"),
                });
                return Ok(DeliveryOutcome::Failed);
            }
        };

        let started = Instant::now();
        self.metrics.inc(&self.metrics.inference_results);
        let now = ticket.captured_at_ms;
        let ctx = self.annotate(&ticket, &detections);

        let update = self.tracker.update(&ctx.detections, now);
        self.metrics.add(&self.metrics.tracks_created, update.created.len() as u64);

        let touched: Vec<TrackId> = update.touched().collect();
        if self.motion.is_enabled() {
            self.tracker.annotate_motion(&touched, &self.motion);
        }

        for id in &update.created {
            if let Some(t) = self.tracker.get_track(*id) {
                self.bus.publish(PipelineEvent::TrackAcquired {
                    id: t.id,
                    class_label: t.class_label.clone(),
                    distance_m: t.distance_m,
                    direction: t.direction,
                });
            }
        }
        self.publish_removals(update.removed);

        // Evaluate in display order so focused and stable objects speak first.
        let ordered = self.tracker.ordered();
        let fresh = ordered.iter().filter(|t| touched.contains(&t.id));
        let batch = self.alerts.evaluate(fresh, now);
        self.metrics.add(&self.metrics.alerts_emitted, batch.events.len() as u64);
        self.metrics.add(&self.metrics.alerts_suppressed, batch.suppressed as u64);
        let alert_count = batch.events.len();
        for event in batch.events {
            self.bus.publish(PipelineEvent::Alert(event));
        }

        self.snapshot = Snapshot {
            frame_id: ticket.frame_id,
            timestamp_ms: now,
            tracks: Arc::from(ordered),
        };
        self.metrics.set_timing(
            &self.metrics.last_update_us,
            started.elapsed().as_micros() as u64,
        );

        if let Some(nearest) = ctx.nearest() {
            debug!(
                "Frame {}: {} tracks, nearest {} at {:.1}m",
                ticket.frame_id,
                self.snapshot.len(),
                nearest.class_label(),
                nearest.distance_m
            );
        }

        Ok(DeliveryOutcome::Applied {
            snapshot: self.snapshot.clone(),
            alerts: alert_count,
            discarded: ctx.rejected.len(),
        })
    }

    /// Stop ticking, invalidate any pending request and forget all state.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        info!(
            "Stopping session ({} live tracks, request pending: {})",
            self.tracker.len(),
            self.scheduler.is_in_flight()
        );
        self.state = SessionState::Stopped;
        self.generation += 1;
        self.tracker.reset();
        self.alerts.reset();
        self.scheduler.reset();
        self.bus.clear();
        self.snapshot = Snapshot::empty();
    }

    /// Resume a stopped session with an empty track set.
    pub fn restart(&mut self) {
        if self.state == SessionState::Stopped {
            info!("Restarting session");
            self.state = SessionState::Running;
        }
    }

    pub fn set_focus(&mut self, id: TrackId) -> bool {
        let focused = self.tracker.set_focus(id);
        if focused {
            self.republish();
        }
        focused
    }

    pub fn clear_focus(&mut self) {
        self.tracker.clear_focus();
        self.republish();
    }

    /// Spoken summary of what is currently around the observer.
    pub fn describe_scene(&self) -> Option<String> {
        describe_scene(&self.snapshot.tracks, SCENE_DESCRIPTION_ITEMS)
    }

    fn annotate(&self, ticket: &InferenceTicket, detections: &[RawDetection]) -> FrameContext {
        let mut ctx = FrameContext::new(
            ticket.frame_id,
            ticket.captured_at_ms,
            ticket.frame_width,
            ticket.frame_height,
        );
        ctx.raw_count = detections.len();

        for det in detections {
            match self
                .annotator
                .annotate(det, ticket.frame_width, ticket.frame_height)
            {
                Ok(annotated) => ctx.detections.push(annotated),
                Err(reason) => {
                    debug!("Dropping {} detection: {}", det.class_label, reason);
                    ctx.rejected.push(reason);
                }
            }
        }

        let malformed = ctx.malformed_count();
        if malformed > 0 {
            warn!(
                "Frame {}: discarded {} malformed detection(s) of {}",
                ctx.frame_id, malformed, ctx.raw_count
            );
        }
        self.metrics
            .add(&self.metrics.detections_accepted, ctx.detections.len() as u64);
        self.metrics
            .add(&self.metrics.detections_discarded, ctx.rejected.len() as u64);
        ctx
    }

    fn publish_removals(&mut self, removed: Vec<RemovedTrack>) {
        self.metrics.add(&self.metrics.tracks_removed, removed.len() as u64);
        for r in removed {
            self.bus.publish(PipelineEvent::TrackLost {
                id: r.id,
                class_label: r.class_label,
                reason: r.reason,
            });
        }
    }

    fn publish_snapshot(&mut self, frame_id: u64, timestamp_ms: f64) {
        self.snapshot = Snapshot {
            frame_id,
            timestamp_ms,
            tracks: Arc::from(self.tracker.ordered()),
        };
    }

    fn republish(&mut self) {
        let (frame_id, timestamp_ms) = (self.snapshot.frame_id, self.snapshot.timestamp_ms);
        self.publish_snapshot(frame_id, timestamp_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn person(x: f32, height: f32) -> RawDetection {
        RawDetection::new("person", BoundingBox::new(x, 100.0, height * 0.4, height), 0.9)
    }

    fn frame(id: u64, t: f64) -> Frame {
        Frame::blank(id, 640, 480, t)
    }

    fn request(session: &mut Session, id: u64, t: f64) -> InferenceTicket {
        let out = session.tick(&frame(id, t)).unwrap();
        assert_eq!(out.status, TickStatus::InferenceRequested);
        out.request.unwrap()
    }

    #[test]
    fn test_tick_without_frame_size_is_skipped() {
        let mut session = Session::new(Config::default()).unwrap();
        let out = session.tick(&Frame::blank(1, 0, 0, 0.0)).unwrap();
        assert_eq!(out.status, TickStatus::FrameNotReady);
        assert!(out.request.is_none());
        assert_eq!(session.metrics().summary().frames_not_ready, 1);
    }

    #[test]
    fn test_pending_request_reuses_results() {
        let mut session = Session::new(Config::default()).unwrap();
        let ticket = request(&mut session, 1, 0.0);

        let out = session.tick(&frame(2, 300.0)).unwrap();
        assert_eq!(out.status, TickStatus::Reused);
        assert!(out.request.is_none());

        session.deliver(ticket, Ok(vec![person(100.0, 150.0)])).unwrap();
        assert_eq!(session.snapshot().len(), 1);

        let out = session.tick(&frame(3, 320.0)).unwrap();
        assert_eq!(out.status, TickStatus::InferenceRequested);
        assert_eq!(out.snapshot.len(), 1);
    }

    #[test]
    fn test_detector_failure_keeps_tracks() {
        let mut session = Session::new(Config::default()).unwrap();
        let t1 = request(&mut session, 1, 0.0);
        session.deliver(t1, Ok(vec![person(100.0, 150.0)])).unwrap();
        let before = session.snapshot();

        let t2 = request(&mut session, 2, 200.0);
        let outcome = session
            .deliver(t2, Err(anyhow::anyhow!("model crashed")))
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed));
        assert_eq!(session.snapshot().tracks, before.tracks);

        let events = session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::InferenceFailed { .. })));
    }

    #[test]
    fn test_malformed_detection_discarded_rest_processed() {
        let mut session = Session::new(Config::default()).unwrap();
        let ticket = request(&mut session, 1, 0.0);
        let bad = RawDetection::new("car", BoundingBox::new(600.0, 10.0, 100.0, 50.0), 0.9);
        let outcome = session.deliver(ticket, Ok(vec![bad, person(100.0, 150.0)])).unwrap();

        match outcome {
            DeliveryOutcome::Applied { snapshot, discarded, .. } => {
                assert_eq!(discarded, 1);
                assert_eq!(snapshot.len(), 1);
                assert_eq!(snapshot.tracks[0].class_label, "person");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_stop_discards_in_flight_result() {
        let mut session = Session::new(Config::default()).unwrap();
        let t1 = request(&mut session, 1, 0.0);
        session.deliver(t1, Ok(vec![person(100.0, 150.0)])).unwrap();

        let t2 = request(&mut session, 2, 200.0);
        session.stop();
        assert!(session.snapshot().is_empty());
        assert!(matches!(session.tick(&frame(3, 250.0)), Err(SessionError::NotRunning)));

        let outcome = session.deliver(t2, Ok(vec![person(100.0, 150.0)])).unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Stale));
        assert!(session.snapshot().is_empty());
        assert!(session.recent_alerts().is_empty());
    }

    #[test]
    fn test_restart_after_stop_ignores_old_ticket() {
        let mut session = Session::new(Config::default()).unwrap();
        let old = request(&mut session, 1, 0.0);
        session.stop();
        session.restart();

        let fresh = request(&mut session, 2, 10.0);
        assert!(matches!(
            session.deliver(old, Ok(vec![person(100.0, 150.0)])).unwrap(),
            DeliveryOutcome::Stale
        ));
        assert!(matches!(
            session.deliver(fresh, Ok(vec![person(100.0, 150.0)])).unwrap(),
            DeliveryOutcome::Applied { .. }
        ));
    }

    #[test]
    fn test_tick_expires_tracks_past_grace() {
        let mut session = Session::new(Config::default()).unwrap();
        let ticket = request(&mut session, 1, 0.0);
        session.deliver(ticket, Ok(vec![person(100.0, 150.0)])).unwrap();

        let out = session.tick(&frame(2, 1500.0)).unwrap();
        assert!(out.snapshot.is_empty());
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TrackLost { .. })));
    }

    #[test]
    fn test_focus_reorders_snapshot() {
        let mut session = Session::new(Config::default()).unwrap();
        let t1 = request(&mut session, 1, 0.0);
        session
            .deliver(t1, Ok(vec![person(50.0, 150.0), person(400.0, 150.0)]))
            .unwrap();
        let last = session.snapshot().tracks[1].id;

        assert!(session.set_focus(last));
        assert_eq!(session.snapshot().tracks[0].id, last);
        assert!(session.snapshot().tracks[0].focused);

        session.clear_focus();
        assert!(session.snapshot().tracks.iter().all(|t| !t.focused));
    }

    #[test]
    fn test_motion_disabled_leaves_fields_empty() {
        let mut config = Config::default();
        config.motion.enable_motion_analysis = false;
        let mut session = Session::new(config).unwrap();
        let t1 = request(&mut session, 1, 0.0);
        session.deliver(t1, Ok(vec![person(100.0, 150.0)])).unwrap();
        let t2 = request(&mut session, 2, 200.0);
        session.deliver(t2, Ok(vec![person(100.0, 160.0)])).unwrap();

        let t = &session.snapshot().tracks[0];
        assert!(t.stable);
        assert!(t.velocity_mps.is_none());
        assert!(t.risk.is_none());
        assert!(!t.proximity_warning);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.alerts.max_alerts = 0;
        assert!(matches!(Session::new(config), Err(SessionError::Config(_))));
    }
}
