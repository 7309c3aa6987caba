//! Monitoring session wiring
//!
//! One task per monitored attempt. The sampler tick and page interactions
//! interleave on the same task, so ticks never overlap. Violations and
//! auto-submit requests leave the session on an mpsc channel; the status
//! badge and preview are published on watch channels.

use crate::detector::LandmarkDetector;
use crate::observers::{InputEvent, InputObservers};
use crate::sampler::SignalSampler;
use crate::state::{AttentionEvents, AttentionStatus};
use crate::ProctorConfig;
use camera_capture::{CameraBackend, VideoFrame};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;
use violation_types::{detection, ViolationType};

/// Output of a monitoring session
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A violation to report
    Violation {
        violation_type: ViolationType,
        detection_method: &'static str,
        details: Value,
    },
    /// Continuous away time reached the limit; repeats while still away
    AutoSubmit { away_seconds: u64 },
}

#[derive(Debug)]
enum Command {
    Input(InputEvent),
    Retry,
    Stop,
}

/// Local tallies when a session ends. Advisory only; the ledger is authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub camera_violations: u32,
    pub input_violations: u32,
    pub final_status: AttentionStatus,
}

impl SessionSummary {
    pub fn local_violations(&self) -> u32 {
        self.camera_violations + self.input_violations
    }
}

/// Cloneable control surface for a running session
#[derive(Debug, Clone)]
pub struct MonitorControl {
    commands: mpsc::UnboundedSender<Command>,
}

impl MonitorControl {
    /// Forward a page interaction; returns false once the session has ended
    pub fn input(&self, event: InputEvent) -> bool {
        self.commands.send(Command::Input(event)).is_ok()
    }

    /// Release any held camera and acquire again
    pub fn retry(&self) {
        let _ = self.commands.send(Command::Retry);
    }

    /// Ask the session to stop; the camera is released on the way out
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Handle owned by the hosting page for the lifetime of a session.
///
/// Dropping the handle stops the session even while [`MonitorControl`]
/// clones are still alive, so the camera is released when the page goes away.
pub struct MonitorHandle {
    session_id: Uuid,
    control: MonitorControl,
    status: watch::Receiver<AttentionStatus>,
    preview: watch::Receiver<Option<Arc<VideoFrame>>>,
    task: Option<JoinHandle<SessionSummary>>,
}

impl MonitorHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn control(&self) -> MonitorControl {
        self.control.clone()
    }

    pub fn input(&self, event: InputEvent) -> bool {
        self.control.input(event)
    }

    pub fn retry(&self) {
        self.control.retry()
    }

    /// Status badge
    pub fn status(&self) -> watch::Receiver<AttentionStatus> {
        self.status.clone()
    }

    /// Camera preview surface
    pub fn preview(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.preview.clone()
    }

    /// Stop the session and wait for teardown
    pub async fn stop(self) -> SessionSummary {
        self.control.stop();
        self.join().await
    }

    /// Wait for the session to end on its own (stopped through a control)
    pub async fn join(mut self) -> SessionSummary {
        let session_id = self.session_id;
        let fallback = || SessionSummary {
            session_id,
            ..Default::default()
        };
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|_| fallback()),
            None => fallback(),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.control.stop();
    }
}

/// Forwards state machine callbacks onto the session channel
struct ChannelEvents<'a> {
    tx: &'a mpsc::UnboundedSender<MonitorEvent>,
}

impl AttentionEvents for ChannelEvents<'_> {
    fn on_violation(&mut self, kind: ViolationType, away_seconds: u64) {
        let _ = self.tx.send(MonitorEvent::Violation {
            violation_type: kind,
            detection_method: detection::CAMERA_HEURISTIC,
            details: json!({ "awaySeconds": away_seconds }),
        });
    }

    fn on_auto_submit(&mut self, away_seconds: u64) {
        let _ = self.tx.send(MonitorEvent::AutoSubmit { away_seconds });
    }
}

fn publish(status_tx: &watch::Sender<AttentionStatus>, status: AttentionStatus) {
    status_tx.send_if_modified(|current| {
        if *current != status {
            *current = status;
            true
        } else {
            false
        }
    });
}

/// Start monitoring. Must be called inside a tokio runtime.
pub fn spawn_session<B, D>(
    mut sampler: SignalSampler<B, D>,
    config: &ProctorConfig,
    user_agent: Option<String>,
    events: mpsc::UnboundedSender<MonitorEvent>,
) -> MonitorHandle
where
    B: CameraBackend + 'static,
    D: LandmarkDetector + 'static,
{
    let session_id = Uuid::new_v4();
    let (commands, mut commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status) = watch::channel(AttentionStatus::Loading);
    let preview = sampler.preview();
    let tick_interval = config.tick_interval();

    let span = info_span!("monitor", session = %session_id);
    let task = tokio::spawn(
        async move {
            let mut observers = InputObservers::new(user_agent);
            publish(&status_tx, sampler.start());
            info!(status = sampler.status().as_str(), "Monitoring started");

            let mut ticker = time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut sink = ChannelEvents { tx: &events };
                        sampler.tick(Instant::now().into_std(), &mut sink);
                        publish(&status_tx, sampler.status());
                    }
                    command = commands_rx.recv() => match command {
                        Some(Command::Input(event)) => {
                            if let Some(v) = observers.observe(&event) {
                                let _ = events.send(MonitorEvent::Violation {
                                    violation_type: v.violation_type,
                                    detection_method: detection::BROWSER_EVENT,
                                    details: v.details,
                                });
                            }
                        }
                        Some(Command::Retry) => {
                            publish(&status_tx, AttentionStatus::Loading);
                            publish(&status_tx, sampler.retry());
                        }
                        Some(Command::Stop) | None => break,
                    }
                }
            }

            let summary = SessionSummary {
                session_id,
                camera_violations: sampler.machine().violation_count(),
                input_violations: observers.count(),
                final_status: sampler.status(),
            };
            sampler.shutdown();
            info!(local_violations = summary.local_violations(), "Monitoring stopped");
            summary
        }
        .instrument(span),
    );

    MonitorHandle {
        session_id,
        control: MonitorControl { commands },
        status,
        preview,
        task: Some(task),
    }
}
