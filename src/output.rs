// src/output.rs
//
// Consumers of the pipeline: speech/haptic announcer and the overlay
// renderer. The log-backed versions are what the replay binary uses.

use crate::types::{AlertEvent, Severity, Snapshot};
use tracing::{debug, info, warn};

pub trait Announcer {
    fn announce(&mut self, event: &AlertEvent);
}

pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot);
}

/// Collects events, handy for tests and offline runs.
impl Announcer for Vec<AlertEvent> {
    fn announce(&mut self, event: &AlertEvent) {
        self.push(event.clone());
    }
}

impl Renderer for Vec<Snapshot> {
    fn render(&mut self, snapshot: &Snapshot) {
        self.push(snapshot.clone());
    }
}

#[derive(Debug, Default)]
pub struct LogAnnouncer {
    pub announced: u64,
    pub interrupted: u64,
}

impl Announcer for LogAnnouncer {
    fn announce(&mut self, event: &AlertEvent) {
        self.announced += 1;
        if event.should_interrupt {
            self.interrupted += 1;
        }
        match event.severity {
            Severity::Danger => warn!("🔊 [interrupt={}] {}", event.should_interrupt, event.message),
            Severity::Warning => warn!("🔊 {}", event.message),
            Severity::Info => info!("🔊 {}", event.message),
        }
    }
}

/// Logs the track list whenever a new result set arrives.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_frame: Option<u64>,
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &Snapshot) {
        if self.last_frame == Some(snapshot.frame_id) {
            return;
        }
        self.last_frame = Some(snapshot.frame_id);

        for t in snapshot.tracks.iter() {
            debug!(
                "  #{:<3} {:<12} {:>5.1}m {:<6} conf={:.2} {}{}{}",
                t.id,
                t.class_label,
                t.distance_m,
                t.direction.as_str(),
                t.confidence,
                if t.stable { "stable " } else { "" },
                if t.focused { "focused " } else { "" },
                t.movement.map(|m| m.as_str()).unwrap_or("-"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_announcer_counts_interrupts() {
        let mut announcer = LogAnnouncer::default();
        announcer.announce(&AlertEvent {
            message: "person approaching ahead, 4.0 meters".into(),
            severity: Severity::Info,
            should_interrupt: false,
        });
        announcer.announce(&AlertEvent {
            message: "Stop! person very close ahead, 1.0 meters".into(),
            severity: Severity::Danger,
            should_interrupt: true,
        });
        assert_eq!(announcer.announced, 2);
        assert_eq!(announcer.interrupted, 1);
    }

    #[test]
    fn test_log_renderer_skips_repeated_frame() {
        let mut renderer = LogRenderer::default();
        renderer.render(&Snapshot::empty());
        assert_eq!(renderer.last_frame, Some(0));
        renderer.render(&Snapshot::empty());
        assert_eq!(renderer.last_frame, Some(0));
    }
}
