// src/pipeline/runtime.rs
//
// Async driver for a Session. Frames are pulled on a fixed tick; the
// detector runs on a blocking worker and its result is marshalled back
// into the loop, so all session mutation stays on one task.

use crate::error::SessionError;
use crate::output::{Announcer, Renderer};
use crate::pipeline::event_bus::PipelineEvent;
use crate::pipeline::session::{DeliveryOutcome, InferenceTicket, Session};
use crate::source::{Detector, FrameSource};
use crate::types::{Frame, RawDetection};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

type InferenceJob<D> = JoinHandle<(D, InferenceTicket, anyhow::Result<Vec<RawDetection>>)>;

/// Drive `session` until the source runs dry or `shutdown` flips to true.
///
/// The session is stopped before it is handed back, whatever the outcome of
/// the loop; its metrics survive the stop.
pub async fn run_session<S, D, A, R>(
    mut session: Session,
    mut source: S,
    detector: D,
    announcer: &mut A,
    renderer: &mut R,
    shutdown: watch::Receiver<bool>,
    tick_interval: Duration,
) -> Result<Session, SessionError>
where
    S: FrameSource,
    D: Detector + 'static,
    A: Announcer,
    R: Renderer,
{
    source
        .open()
        .map_err(|e| SessionError::acquisition(format!("{e:#}")))?;
    info!("✓ Frame source opened, detector: {}", detector.name());

    let result = drive(
        &mut session,
        &mut source,
        detector,
        announcer,
        renderer,
        shutdown,
        tick_interval,
    )
    .await;
    session.stop();
    result.map(|_| session)
}

async fn drive<S, D, A, R>(
    session: &mut Session,
    source: &mut S,
    detector: D,
    announcer: &mut A,
    renderer: &mut R,
    mut shutdown: watch::Receiver<bool>,
    tick_interval: Duration,
) -> Result<(), SessionError>
where
    S: FrameSource,
    D: Detector + 'static,
    A: Announcer,
    R: Renderer,
{
    let mut detector = Some(detector);
    let mut pending: Option<InferenceJob<D>> = None;
    let mut exhausted = false;

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown requested");
                    return Ok(());
                }
            }

            joined = async {
                match pending.as_mut() {
                    Some(job) => job.await,
                    None => std::future::pending().await,
                }
            }, if pending.is_some() => {
                pending = None;
                let (returned, ticket, result) =
                    joined.map_err(|e| SessionError::DetectorLost(e.to_string()))?;
                detector = Some(returned);

                if let DeliveryOutcome::Applied { snapshot, .. } = session.deliver(ticket, result)? {
                    renderer.render(&snapshot);
                }
                dispatch(session.drain_events(), announcer);

                if exhausted {
                    return Ok(());
                }
            }

            _ = interval.tick(), if !exhausted => {
                let frame = match source.read_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        info!("Frame source exhausted");
                        exhausted = true;
                        if pending.is_none() {
                            return Ok(());
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!("Frame source failed: {:#}", e);
                        exhausted = true;
                        if pending.is_none() {
                            return Ok(());
                        }
                        continue;
                    }
                };

                let out = session.tick(&frame)?;
                renderer.render(&out.snapshot);
                dispatch(out.events, announcer);

                if let Some(ticket) = out.request {
                    match detector.take() {
                        Some(d) => pending = Some(spawn_inference(d, ticket, frame)),
                        None => {
                            let busy = anyhow::anyhow!("detector still busy");
                            session.deliver(ticket, Err(busy))?;
                        }
                    }
                }

                if let Some(p) = source.progress() {
                    debug!("Source progress: {:.1}%", p);
                }
            }
        }
    }
}

fn spawn_inference<D>(mut detector: D, ticket: InferenceTicket, frame: Frame) -> InferenceJob<D>
where
    D: Detector + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = detector.detect(&frame);
        (detector, ticket, result)
    })
}

fn dispatch<A: Announcer>(events: Vec<PipelineEvent>, announcer: &mut A) {
    for event in events {
        match event {
            PipelineEvent::Alert(alert) => announcer.announce(&alert),
            PipelineEvent::TrackAcquired {
                id,
                class_label,
                distance_m,
                direction,
            } => {
                info!(
                    "New track #{}: {} {} at {:.1}m",
                    id,
                    class_label,
                    direction.phrase(),
                    distance_m
                );
            }
            PipelineEvent::TrackLost {
                id,
                class_label,
                reason,
            } => {
                debug!("Lost track #{} ({}): {:?}", id, class_label, reason);
            }
            PipelineEvent::InferenceFailed { request_id, reason } => {
                warn!("Inference request {} failed: {}", request_id, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{AlertEvent, BoundingBox, Snapshot};
    use std::collections::VecDeque;

    struct ScriptedSource {
        frames: VecDeque<Frame>,
        fail_open: bool,
    }

    impl ScriptedSource {
        fn new(count: u64, step_ms: f64) -> Self {
            let frames = (0..count)
                .map(|i| Frame::blank(i + 1, 640, 480, i as f64 * step_ms))
                .collect();
            Self {
                frames,
                fail_open: false,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> anyhow::Result<()> {
            if self.fail_open {
                anyhow::bail!("camera permission denied");
            }
            Ok(())
        }

        fn read_frame(&mut self) -> anyhow::Result<Option<Frame>> {
            Ok(self.frames.pop_front())
        }
    }

    /// A person walking straight at the camera: box grows every call.
    struct ApproachingPerson {
        calls: u32,
    }

    impl Detector for ApproachingPerson {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<RawDetection>> {
            self.calls += 1;
            let h = 100.0 + 40.0 * self.calls as f32;
            let bbox = BoundingBox::new(320.0 - h * 0.2, 40.0, h * 0.4, h);
            Ok(vec![RawDetection::new("person", bbox, 0.9)])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Panicking;

    impl Detector for Panicking {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<RawDetection>> {
            panic!("model runtime crashed");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn session() -> Session {
        Session::new(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_runs_until_source_exhausted() {
        let (_tx, rx) = watch::channel(false);
        let mut alerts: Vec<AlertEvent> = Vec::new();
        let mut snapshots: Vec<Snapshot> = Vec::new();

        let session = run_session(
            session(),
            ScriptedSource::new(12, 200.0),
            ApproachingPerson { calls: 0 },
            &mut alerts,
            &mut snapshots,
            rx,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        let summary = session.metrics().summary();
        assert_eq!(summary.ticks, 12);
        assert!(summary.inference_results >= 2);
        assert!(snapshots.iter().any(|s| !s.is_empty()));
        assert!(alerts.iter().any(|a| a.message.contains("person")));
        // stopped on the way out
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_is_acquisition_error() {
        let (_tx, rx) = watch::channel(false);
        let mut source = ScriptedSource::new(3, 100.0);
        source.fail_open = true;

        let result = run_session(
            session(),
            source,
            ApproachingPerson { calls: 0 },
            &mut Vec::<AlertEvent>::new(),
            &mut Vec::<Snapshot>::new(),
            rx,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(SessionError::Acquisition(_))));
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let session = run_session(
            session(),
            ScriptedSource::new(10_000, 16.0),
            ApproachingPerson { calls: 0 },
            &mut Vec::<AlertEvent>::new(),
            &mut Vec::<Snapshot>::new(),
            rx,
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        assert!(session.metrics().summary().ticks < 10_000);
    }

    #[tokio::test]
    async fn test_worker_panic_reports_detector_lost() {
        let (_tx, rx) = watch::channel(false);
        let result = run_session(
            session(),
            ScriptedSource::new(5, 200.0),
            Panicking,
            &mut Vec::<AlertEvent>::new(),
            &mut Vec::<Snapshot>::new(),
            rx,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(SessionError::DetectorLost(_))));
    }
}
