//! Reporter loop
//!
//! Consumes a monitoring session's events, forwards each violation to the
//! ledger and reacts to auto-submit from either side of the boundary.

use crate::{ClientError, ViolationSink};
use async_trait::async_trait;
use proctor::{MonitorControl, MonitorEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use violation_types::ViolationReport;

/// Hosting page capabilities the reporter needs
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Finalize the attempt through the submission pipeline
    async fn finalize_attempt(&self, attempt_id: i64) -> Result<(), ClientError>;

    /// Navigate to the attempt's results view
    fn redirect_to_results(&self, attempt_id: i64);
}

/// Why reporting ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The ledger crossed its violation threshold and submitted the attempt
    ServerAutoSubmit,
    /// Continuous away time reached the limit
    AwayLimit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReporterOutcome {
    /// Advisory local tally; never reconciled with the ledger
    pub local_violations: u32,
    pub failed_reports: u32,
    pub last_server_count: Option<i64>,
    pub finished: Option<FinishReason>,
}

pub struct Reporter<S, H> {
    attempt_id: i64,
    sink: S,
    host: H,
    monitor: Option<MonitorControl>,
    outcome: ReporterOutcome,
}

impl<S, H> Reporter<S, H>
where
    S: ViolationSink,
    H: SessionHost,
{
    pub fn new(attempt_id: i64, sink: S, host: H) -> Self {
        Self {
            attempt_id,
            sink,
            host,
            monitor: None,
            outcome: ReporterOutcome::default(),
        }
    }

    /// Stop this session's monitoring when the attempt ends
    pub fn with_monitor(mut self, control: MonitorControl) -> Self {
        self.monitor = Some(control);
        self
    }

    pub fn outcome(&self) -> &ReporterOutcome {
        &self.outcome
    }

    /// Handle one session event. Returns the finish reason once the attempt ends.
    pub async fn handle(&mut self, event: MonitorEvent) -> Option<FinishReason> {
        if self.outcome.finished.is_some() {
            return self.outcome.finished;
        }

        match event {
            MonitorEvent::Violation {
                violation_type,
                detection_method,
                details,
            } => {
                self.outcome.local_violations += 1;
                let report = ViolationReport::new(violation_type, detection_method).with_details(details);

                match self.sink.report(self.attempt_id, &report).await {
                    Ok(receipt) => {
                        debug!(
                            %violation_type,
                            count = receipt.violation_count,
                            severity = %receipt.severity,
                            "Violation recorded"
                        );
                        self.outcome.last_server_count = Some(receipt.violation_count);
                        if receipt.auto_submitted {
                            info!(attempt_id = self.attempt_id, "Attempt auto-submitted by server");
                            self.finish(FinishReason::ServerAutoSubmit);
                        }
                    }
                    Err(e) => {
                        self.outcome.failed_reports += 1;
                        warn!(%violation_type, "Violation report dropped: {}", e);
                    }
                }
            }
            MonitorEvent::AutoSubmit { away_seconds } => {
                info!(attempt_id = self.attempt_id, away_seconds, "Away limit reached, submitting");
                match self.host.finalize_attempt(self.attempt_id).await {
                    Ok(()) => self.finish(FinishReason::AwayLimit),
                    // Repeats on the next tick while still away
                    Err(e) => warn!("Auto-submit failed: {}", e),
                }
            }
        }

        self.outcome.finished
    }

    /// Drain events until the session ends or the attempt is submitted
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<MonitorEvent>) -> ReporterOutcome {
        while let Some(event) = events.recv().await {
            if self.handle(event).await.is_some() {
                break;
            }
        }
        self.outcome
    }

    fn finish(&mut self, reason: FinishReason) {
        self.outcome.finished = Some(reason);
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
        self.host.redirect_to_results(self.attempt_id);
    }
}
