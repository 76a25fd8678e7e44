// src/pipeline/event_bus.rs
//
// Decoupled event queue between the tick and its consumers. The pipeline
// publishes; the announcer and renderer drain once per tick.

use crate::analysis::object_tracker::RemovalReason;
use crate::types::{AlertEvent, Direction, TrackId};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Alert(AlertEvent),

    TrackAcquired {
        id: TrackId,
        class_label: String,
        distance_m: f32,
        direction: Direction,
    },

    TrackLost {
        id: TrackId,
        class_label: String,
        reason: RemovalReason,
    },

    InferenceFailed {
        request_id: u64,
        reason: String,
    },
}

impl PipelineEvent {
    pub fn as_alert(&self) -> Option<&AlertEvent> {
        match self {
            Self::Alert(alert) => Some(alert),
            _ => None,
        }
    }
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending: max_pending.max(1),
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        // An interrupting alert replaces any chatter not yet announced.
        if let PipelineEvent::Alert(alert) = &event {
            if alert.should_interrupt {
                let before = self.events.len();
                self.events.retain(|e| match e {
                    PipelineEvent::Alert(queued) => queued.should_interrupt,
                    _ => true,
                });
                let dropped = before - self.events.len();
                if dropped > 0 {
                    debug!("Interrupting alert replaced {} queued alert(s)", dropped);
                }
            }
        }

        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn alert(message: &str, should_interrupt: bool) -> PipelineEvent {
        PipelineEvent::Alert(AlertEvent {
            message: message.to_string(),
            severity: if should_interrupt {
                Severity::Danger
            } else {
                Severity::Info
            },
            should_interrupt,
        })
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        bus.publish(alert("a", false));
        bus.publish(alert("b", false));
        bus.publish(alert("c", false));
        let drained = bus.drain();
        assert_eq!(drained, vec![alert("b", false), alert("c", false)]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_interrupting_alert_replaces_queued_alerts() {
        let mut bus = EventBus::new(8);
        bus.publish(alert("person approaching", false));
        bus.publish(PipelineEvent::InferenceFailed {
            request_id: 3,
            reason: "timeout".to_string(),
        });
        bus.publish(alert("Stop!", true));

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], PipelineEvent::InferenceFailed { .. }));
        assert_eq!(drained[1].as_alert().map(|a| a.should_interrupt), Some(true));
    }
}
