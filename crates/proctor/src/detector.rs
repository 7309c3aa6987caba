//! Face detection seam and per-frame look classification

use crate::pose::{estimate_head_pose, FaceLandmarks, HeadPose};
use crate::{ProctorConfig, ProctorError};
use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

/// Face detection plus landmark extraction.
///
/// Implementations wrap whatever model the host ships. `Ok(None)` means the
/// frame was processed and no face was found; `Err` means the tick failed.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, ProctorError>;
}

impl<F> LandmarkDetector for F
where
    F: FnMut(&VideoFrame) -> Result<Option<FaceLandmarks>, ProctorError> + Send,
{
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, ProctorError> {
        self(frame)
    }
}

/// One tick's classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceSample {
    /// Face present and inside the looking cone
    Looking,
    /// Face present but turned away
    TurnedAway,
    /// No face in frame
    NoFace,
}

impl FaceSample {
    pub fn is_looking(&self) -> bool {
        matches!(self, FaceSample::Looking)
    }
}

/// Classify detector output for one frame
pub fn classify(landmarks: Option<&FaceLandmarks>, config: &ProctorConfig) -> (FaceSample, Option<HeadPose>) {
    match landmarks {
        None => (FaceSample::NoFace, None),
        Some(lm) => {
            let pose = estimate_head_pose(lm);
            let sample = if pose.within(config.yaw_limit_degrees, config.pitch_limit_degrees) {
                FaceSample::Looking
            } else {
                FaceSample::TurnedAway
            };
            (sample, Some(pose))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Point;

    fn landmarks(nose_x: f32, nose_y: f32) -> FaceLandmarks {
        FaceLandmarks {
            left_eye_outer: Point::new(100.0, 100.0),
            right_eye_outer: Point::new(200.0, 100.0),
            nose_tip: Point::new(nose_x, nose_y),
            chin: Point::new(150.0, 250.0),
            mouth_left: Point::new(125.0, 200.0),
            mouth_right: Point::new(175.0, 200.0),
        }
    }

    #[test]
    fn test_no_face_classification() {
        let (sample, pose) = classify(None, &ProctorConfig::default());
        assert_eq!(sample, FaceSample::NoFace);
        assert!(pose.is_none());
    }

    #[test]
    fn test_yaw_boundary() {
        let config = ProctorConfig::default();
        // 30 degrees exactly: offset = 30/45 * 50
        let at_limit = landmarks(150.0 + 30.0 / 45.0 * 50.0 - 0.01, 155.0);
        assert_eq!(classify(Some(&at_limit), &config).0, FaceSample::Looking);

        let past_limit = landmarks(150.0 + 40.0, 155.0);
        assert_eq!(classify(Some(&past_limit), &config).0, FaceSample::TurnedAway);
    }

    #[test]
    fn test_pitch_boundary() {
        let config = ProctorConfig::default();
        // pitch 24 degrees -> looking, pitch 32 degrees -> turned away
        assert_eq!(classify(Some(&landmarks(150.0, 185.0)), &config).0, FaceSample::Looking);
        assert_eq!(classify(Some(&landmarks(150.0, 195.0)), &config).0, FaceSample::TurnedAway);
    }

    #[test]
    fn test_closure_detector() {
        let mut detector = |_: &VideoFrame| -> Result<Option<FaceLandmarks>, ProctorError> {
            Ok(Some(landmarks(150.0, 155.0)))
        };
        let frame = VideoFrame::blank(2, 2);
        assert!(LandmarkDetector::detect(&mut detector, &frame).unwrap().is_some());
    }
}
