//! Attention state machine
//!
//! Consumes one [`FaceSample`] per tick, smooths it with a majority vote
//! over a short window, and tracks continuous away time. A violation fires
//! once per away episode after the grace period; auto-submit fires on every
//! tick once the away limit is reached.

use crate::detector::FaceSample;
use crate::ProctorConfig;
use ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use violation_types::ViolationType;

/// Status badge shown to the hosting page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionStatus {
    /// Camera still starting
    #[default]
    Loading,
    Looking,
    /// Face detected but turned away past the grace period
    Away,
    /// No face past the grace period
    NoFace,
    /// Camera unavailable (no device, busy, other failure)
    Error,
    /// Camera refused by the user or browser
    PermissionDenied,
}

impl AttentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionStatus::Loading => "loading",
            AttentionStatus::Looking => "looking",
            AttentionStatus::Away => "away",
            AttentionStatus::NoFace => "no_face",
            AttentionStatus::Error => "error",
            AttentionStatus::PermissionDenied => "permission_denied",
        }
    }

    /// Acquisition failed; only an explicit retry leaves this state
    pub fn needs_retry(&self) -> bool {
        matches!(self, AttentionStatus::Error | AttentionStatus::PermissionDenied)
    }
}

/// Capabilities the state machine calls out to
pub trait AttentionEvents {
    /// A continuous away episode crossed the grace period
    fn on_violation(&mut self, kind: ViolationType, away_seconds: u64);

    /// Continuous away time reached the limit
    fn on_auto_submit(&mut self, away_seconds: u64);
}

/// [`AttentionEvents`] from a pair of closures
pub struct AttentionCallbacks<V, A> {
    pub on_violation: V,
    pub on_auto_submit: A,
}

impl<V, A> AttentionEvents for AttentionCallbacks<V, A>
where
    V: FnMut(ViolationType, u64),
    A: FnMut(u64),
{
    fn on_violation(&mut self, kind: ViolationType, away_seconds: u64) {
        (self.on_violation)(kind, away_seconds)
    }

    fn on_auto_submit(&mut self, away_seconds: u64) {
        (self.on_auto_submit)(away_seconds)
    }
}

/// Per-session attention tracking
#[derive(Debug, Clone)]
pub struct AttentionMachine {
    grace_period: Duration,
    away_limit: Duration,
    majority: usize,
    buffer: RingBuffer<FaceSample>,
    status: AttentionStatus,
    away_started_at: Option<Instant>,
    away_seconds: u64,
    /// Violation already fired for the current away episode
    episode_reported: bool,
    violation_count: u32,
}

impl AttentionMachine {
    pub fn new(config: &ProctorConfig) -> Self {
        Self {
            grace_period: config.grace_period(),
            away_limit: config.away_limit(),
            majority: config.smoothing_majority.max(1),
            buffer: RingBuffer::new(config.smoothing_window),
            status: AttentionStatus::Loading,
            away_started_at: None,
            away_seconds: 0,
            episode_reported: false,
            violation_count: 0,
        }
    }

    /// Feed one tick's sample
    pub fn update(
        &mut self,
        sample: FaceSample,
        now: Instant,
        events: &mut dyn AttentionEvents,
    ) -> AttentionStatus {
        self.buffer.push(sample);

        if self.smoothed_looking() {
            if self.away_started_at.take().is_some() {
                debug!(away_seconds = self.away_seconds, "Attention recovered");
            }
            self.away_seconds = 0;
            self.episode_reported = false;
            self.status = AttentionStatus::Looking;
            return self.status;
        }

        let started = *self.away_started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        if elapsed < self.grace_period {
            return self.status;
        }

        self.away_seconds = (elapsed.as_millis() as f64 / 1000.0).round() as u64;
        self.status = if self.buffer.iter().any(|s| *s == FaceSample::TurnedAway) {
            AttentionStatus::Away
        } else {
            AttentionStatus::NoFace
        };

        if !self.episode_reported {
            self.episode_reported = true;
            self.violation_count += 1;
            let kind = match self.status {
                AttentionStatus::Away => ViolationType::FaceAway,
                _ => ViolationType::NoFace,
            };
            info!(%kind, count = self.violation_count, "Away violation");
            events.on_violation(kind, self.away_seconds);
        }

        if elapsed >= self.away_limit {
            warn!(away_seconds = self.away_seconds, "Away limit reached");
            events.on_auto_submit(self.away_seconds);
        }

        self.status
    }

    /// Majority vote over the window. The threshold does not shrink while the
    /// window is still filling, so the first ticks of a session count as away.
    pub fn smoothed_looking(&self) -> bool {
        self.buffer.count_where(|s| s.is_looking()) >= self.majority
    }

    pub fn status(&self) -> AttentionStatus {
        self.status
    }

    /// Set a session-level status from the sampler (loading, error, permission)
    pub fn set_status(&mut self, status: AttentionStatus) {
        self.status = status;
    }

    pub fn away_seconds(&self) -> u64 {
        self.away_seconds
    }

    pub fn away_started_at(&self) -> Option<Instant> {
        self.away_started_at
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    /// Tear down session state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.status = AttentionStatus::Loading;
        self.away_started_at = None;
        self.away_seconds = 0;
        self.episode_reported = false;
        self.violation_count = 0;
    }
}
