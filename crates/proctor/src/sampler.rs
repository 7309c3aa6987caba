//! Camera signal sampler
//!
//! Owns the camera for one monitoring session and turns each tick's frame
//! into a [`FaceSample`] for the attention state machine.

use crate::detector::{classify, FaceSample, LandmarkDetector};
use crate::pose::HeadPose;
use crate::state::{AttentionEvents, AttentionMachine, AttentionStatus};
use crate::ProctorConfig;
use camera_capture::{CameraBackend, CameraConfig, CameraStream, PermissionState, VideoFrame};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of a processed tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub sample: FaceSample,
    pub pose: Option<HeadPose>,
    pub status: AttentionStatus,
}

/// Camera sampler with its attention state
pub struct SignalSampler<B, D> {
    backend: B,
    detector: D,
    camera_config: CameraConfig,
    config: ProctorConfig,
    stream: Option<CameraStream>,
    machine: AttentionMachine,
    preview: watch::Sender<Option<Arc<VideoFrame>>>,
}

impl<B, D> SignalSampler<B, D>
where
    B: CameraBackend,
    D: LandmarkDetector,
{
    pub fn new(backend: B, detector: D, camera_config: CameraConfig, config: ProctorConfig) -> Self {
        let (preview, _) = watch::channel(None);
        Self {
            machine: AttentionMachine::new(&config),
            backend,
            detector,
            camera_config,
            config,
            stream: None,
            preview,
        }
    }

    /// Acquire the camera.
    ///
    /// A queryable `denied` permission is terminal and skips acquisition.
    pub fn start(&mut self) -> AttentionStatus {
        self.machine.set_status(AttentionStatus::Loading);

        if self.backend.permission() == Some(PermissionState::Denied) {
            info!("Camera permission denied, not prompting");
            self.machine.set_status(AttentionStatus::PermissionDenied);
            return self.status();
        }

        match CameraStream::open(&mut self.backend, self.camera_config.clone()) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.machine.set_status(AttentionStatus::Looking);
            }
            Err(e) if e.is_permission_denied() => {
                warn!("Camera access refused: {}", e);
                self.machine.set_status(AttentionStatus::PermissionDenied);
            }
            Err(e) => {
                warn!("Camera acquisition failed: {}", e);
                self.machine.set_status(AttentionStatus::Error);
            }
        }

        self.status()
    }

    /// Tear down any held stream and acquire again
    pub fn retry(&mut self) -> AttentionStatus {
        info!("Retrying camera acquisition");
        self.release();
        self.start()
    }

    /// Run one detection tick.
    ///
    /// Returns `None` when the tick is skipped: no stream, stream not ready,
    /// or a frame/detection failure. Skipped ticks never change state.
    pub fn tick(&mut self, now: Instant, events: &mut dyn AttentionEvents) -> Option<TickReport> {
        let stream = match self.stream.as_mut() {
            Some(stream) if stream.is_ready() => stream,
            _ => return None,
        };

        let frame = match stream.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Frame read failed, skipping tick: {}", e);
                return None;
            }
        };

        let landmarks = match self.detector.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                debug!("Detection failed, skipping tick: {}", e);
                return None;
            }
        };

        self.preview.send_replace(Some(Arc::new(frame)));

        let (sample, pose) = classify(landmarks.as_ref(), &self.config);
        let status = self.machine.update(sample, now, events);

        Some(TickReport {
            sample,
            pose,
            status,
        })
    }

    /// Release the camera. Safe to call on every exit path.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
        self.preview.send_replace(None);
    }

    /// Latest processed frame for the preview surface
    pub fn preview(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.preview.subscribe()
    }

    pub fn status(&self) -> AttentionStatus {
        self.machine.status()
    }

    pub fn machine(&self) -> &AttentionMachine {
        &self.machine
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Release the camera and discard session state
    pub fn shutdown(&mut self) {
        self.release();
        self.machine.reset();
    }
}

impl<B, D> Drop for SignalSampler<B, D> {
    fn drop(&mut self) {
        // CameraStream releases itself on drop; clear the preview too
        self.preview.send_replace(None);
    }
}
