//! Camera Capture Library for Exam Monitoring
//!
//! Provides camera acquisition for the attention sampler:
//! - Permission query without prompting
//! - Device acquisition with a failure taxonomy (denied vs. unavailable)
//! - Scoped streams that release the device on every exit path

pub mod frame;
pub mod stream;

pub use frame::VideoFrame;
pub use stream::CameraStream;

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NotFound,

    #[error("Camera busy: {0}")]
    Busy(String),

    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Invalid frame: {0}")]
    Frame(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// Whether the failure is a refusal by the user or platform
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }
}

/// Permission state reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    /// Acquisition will prompt the user
    Prompt,
    Denied,
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device identifier (e.g., "/dev/video0" or a browser device id)
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            width: 640,
            height: 480,
            fps: 15,
        }
    }
}

/// A live source of frames held open by an acquired camera
pub trait FrameSource: Send {
    /// Whether the source has produced its first frame
    fn is_ready(&self) -> bool;

    /// Read the current frame
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stop capture and release the device
    fn stop(&mut self);
}

/// Platform camera access
pub trait CameraBackend: Send {
    /// Query permission without prompting; `None` when the platform cannot tell
    fn permission(&self) -> Option<PermissionState>;

    /// Acquire the device and start capture
    fn open(&mut self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        assert!(CameraError::PermissionDenied.is_permission_denied());
        assert!(!CameraError::NotFound.is_permission_denied());
        assert!(!CameraError::Busy("in use".into()).is_permission_denied());
    }

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert_eq!((config.width, config.height), (640, 480));
    }
}
