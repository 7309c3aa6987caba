//! Exam Attention Monitoring
//!
//! Client-side integrity signals for a quiz attempt:
//! - Head pose estimation from facial landmarks
//! - ONNX landmark model adapter
//! - Smoothed attention state machine with grace period and auto-submit
//! - Page interaction observers (tab switch, clipboard, shortcuts)
//! - Monitoring session that owns the camera and emits violations

pub mod config;
pub mod detector;
pub mod model;
pub mod observers;
pub mod pose;
pub mod sampler;
pub mod session;
pub mod state;

pub use config::ProctorConfig;
pub use detector::{classify, FaceSample, LandmarkDetector};
pub use model::OnnxLandmarkDetector;
pub use observers::{InputEvent, InputObservers, InputViolation, KeyCombo};
pub use pose::{estimate_head_pose, FaceLandmarks, HeadPose, LandmarkLayout, Point};
pub use sampler::{SignalSampler, TickReport};
pub use session::{spawn_session, MonitorControl, MonitorEvent, MonitorHandle, SessionSummary};
pub use state::{AttentionCallbacks, AttentionEvents, AttentionMachine, AttentionStatus};

use camera_capture::CameraError;
use thiserror::Error;

/// Proctor error types
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Landmarks unusable: {0}")]
    Landmarks(String),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Configuration error: {0}")]
    Config(String),
}
