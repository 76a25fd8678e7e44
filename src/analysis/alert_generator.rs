// src/analysis/alert_generator.rs
//
// Turns risk-classified tracks into spoken alert data. At most one alert per
// track per evaluation; repeats for the same (class, zone, movement) key are
// held back until the cooldown for that key has elapsed.

use crate::types::{
    Alert, AlertEvent, Direction, MovementDirection, RiskLevel, Severity, TrackedObject,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enable_proximity_alerts: bool,
    /// Minimum gap between two alerts sharing a key
    pub alert_cooldown_ms: f64,
    /// Gap used instead when the new alert interrupts (proximity, critical risk)
    pub critical_cooldown_ms: f64,
    /// Size of the most-recent-first alert log
    pub max_alerts: usize,
    /// Ignore tracks that have not yet reached stability
    pub require_stable: bool,
    /// Approaching objects closer than this produce an informational alert
    pub approach_alert_distance_m: f32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enable_proximity_alerts: true,
            alert_cooldown_ms: 4000.0,
            critical_cooldown_ms: 1500.0,
            max_alerts: 8,
            require_stable: true,
            approach_alert_distance_m: 5.0,
        }
    }
}

/// Which rule produced an alert, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Proximity,
    CriticalRisk,
    HighRisk,
    Approaching,
}

impl AlertKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Proximity | Self::CriticalRisk => Severity::Danger,
            Self::HighRisk => Severity::Warning,
            Self::Approaching => Severity::Info,
        }
    }

    pub fn interrupts(&self) -> bool {
        matches!(self, Self::Proximity | Self::CriticalRisk)
    }
}

/// Deduplication key. Two people approaching on the left share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub class_label: String,
    pub direction: Direction,
    pub movement: Option<MovementDirection>,
}

impl AlertKey {
    pub fn for_track(track: &TrackedObject) -> Self {
        Self {
            class_label: track.class_label.clone(),
            direction: track.direction,
            movement: track.movement,
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct AlertBatch {
    pub events: Vec<AlertEvent>,
    pub suppressed: usize,
}

pub struct AlertGenerator {
    pub config: AlertConfig,
    /// Last emission time and severity per key
    cooldowns: HashMap<AlertKey, (f64, Severity)>,
    /// Newest first
    log: VecDeque<Alert>,
    next_id: u64,
}

impl AlertGenerator {
    pub fn new(config: AlertConfig) -> Self {
        let capacity = config.max_alerts;
        Self {
            config,
            cooldowns: HashMap::new(),
            log: VecDeque::with_capacity(capacity),
            next_id: 1,
        }
    }

    /// Highest-priority rule that applies to this track, if any.
    pub fn classify(&self, track: &TrackedObject) -> Option<AlertKind> {
        if self.config.require_stable && !track.stable {
            return None;
        }
        if self.config.enable_proximity_alerts && track.proximity_warning {
            return Some(AlertKind::Proximity);
        }
        match track.risk {
            Some(RiskLevel::Critical) => return Some(AlertKind::CriticalRisk),
            Some(RiskLevel::High) => return Some(AlertKind::HighRisk),
            _ => {}
        }
        if track.movement == Some(MovementDirection::Approaching)
            && track.distance_m < self.config.approach_alert_distance_m
        {
            return Some(AlertKind::Approaching);
        }
        None
    }

    /// Evaluate tracks in the given order and emit the alerts that pass the
    /// cooldown gate.
    pub fn evaluate<'a, I>(&mut self, tracks: I, now_ms: f64) -> AlertBatch
    where
        I: IntoIterator<Item = &'a TrackedObject>,
    {
        self.expire_cooldowns(now_ms);
        let mut batch = AlertBatch::default();

        for track in tracks {
            let Some(kind) = self.classify(track) else {
                continue;
            };

            let key = AlertKey::for_track(track);
            let cooldown = if kind.interrupts() {
                self.config.critical_cooldown_ms
            } else {
                self.config.alert_cooldown_ms
            };
            // An escalation on the same key is never held back by a softer alert.
            if let Some(&(last, previous)) = self.cooldowns.get(&key) {
                if kind.severity() <= previous && now_ms - last < cooldown {
                    debug!(
                        "Alert {:?} for T{} suppressed ({:.0}ms into {:.0}ms cooldown)",
                        kind,
                        track.id,
                        now_ms - last,
                        cooldown
                    );
                    batch.suppressed += 1;
                    continue;
                }
            }
            self.cooldowns.insert(key, (now_ms, kind.severity()));

            let event = AlertEvent {
                message: compose_message(kind, track),
                severity: kind.severity(),
                should_interrupt: kind.interrupts(),
            };
            match event.severity {
                Severity::Danger => warn!("ALERT T{}: {}", track.id, event.message),
                _ => info!("Alert T{}: {}", track.id, event.message),
            }
            self.record(track, &event, now_ms);
            batch.events.push(event);
        }

        batch
    }

    /// Alert log, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &Alert> {
        self.log.iter()
    }

    pub fn cooldown_entries(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn reset(&mut self) {
        self.cooldowns.clear();
        self.log.clear();
    }

    fn record(&mut self, track: &TrackedObject, event: &AlertEvent, now_ms: f64) {
        self.log.push_front(Alert {
            id: self.next_id,
            track_id: track.id,
            message: event.message.clone(),
            severity: event.severity,
            timestamp_ms: now_ms,
        });
        self.next_id += 1;
        self.log.truncate(self.config.max_alerts);
    }

    fn expire_cooldowns(&mut self, now_ms: f64) {
        let horizon = self
            .config
            .alert_cooldown_ms
            .max(self.config.critical_cooldown_ms);
        self.cooldowns.retain(|_, (last, _)| now_ms - *last < horizon);
    }
}

fn compose_message(kind: AlertKind, track: &TrackedObject) -> String {
    let label = &track.class_label;
    let place = track.direction.phrase();
    let distance = track.distance_m;
    match kind {
        AlertKind::Proximity => format!("Stop! {label} very close {place}, {distance:.1} meters"),
        AlertKind::CriticalRisk => format!(
            "Danger! {label} moving fast {place} at {:.1} meters per second",
            track.velocity_mps.unwrap_or(0.0)
        ),
        AlertKind::HighRisk => format!("Warning, {label} {place}, {distance:.1} meters"),
        AlertKind::Approaching => format!("{label} approaching {place}, {distance:.1} meters"),
    }
}

/// One-line summary of the most important stable tracks, in the order given.
pub fn describe_scene(tracks: &[TrackedObject], max_items: usize) -> Option<String> {
    let parts: Vec<String> = tracks
        .iter()
        .filter(|t| t.stable)
        .take(max_items)
        .map(|t| format!("{} {}, {:.1} meters", t.class_label, t.direction.phrase(), t.distance_m))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
