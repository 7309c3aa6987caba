//! Head pose heuristic from facial landmark geometry
//!
//! Not a calibrated camera model: yaw comes from the nose tip's horizontal
//! offset against the outer eye corners, pitch from its vertical position
//! between the eye line and the mouth. Cheap enough to run on every tick.

use crate::ProctorError;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Yaw at a nose offset of half the eye distance (degrees)
pub const YAW_SCALE_DEGREES: f32 = 45.0;

/// Nose position between eye line and mouth for a frontal face
pub const PITCH_BASELINE_RATIO: f32 = 0.55;

/// Degrees per unit of pitch ratio deviation
pub const PITCH_SCALE_DEGREES: f32 = 80.0;

/// 2-D image point (pixels, y grows downward)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Named landmarks used by the pose heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye_outer: Point,
    pub right_eye_outer: Point,
    pub nose_tip: Point,
    pub chin: Point,
    pub mouth_left: Point,
    pub mouth_right: Point,
}

/// Indices of the named landmarks in a landmark model's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkLayout {
    pub points: usize,
    pub left_eye_outer: usize,
    pub right_eye_outer: usize,
    pub nose_tip: usize,
    pub chin: usize,
    pub mouth_left: usize,
    pub mouth_right: usize,
}

impl LandmarkLayout {
    /// iBUG 300-W 68-point annotation
    pub const IBUG_68: LandmarkLayout = LandmarkLayout {
        points: 68,
        left_eye_outer: 36,
        right_eye_outer: 45,
        nose_tip: 30,
        chin: 8,
        mouth_left: 48,
        mouth_right: 54,
    };

    /// 468-point face mesh
    pub const FACE_MESH_468: LandmarkLayout = LandmarkLayout {
        points: 468,
        left_eye_outer: 33,
        right_eye_outer: 263,
        nose_tip: 1,
        chin: 152,
        mouth_left: 61,
        mouth_right: 291,
    };
}

impl FaceLandmarks {
    /// Pick the named landmarks out of a `(points, 2+)` model output
    pub fn from_array(array: ArrayView2<'_, f32>, layout: &LandmarkLayout) -> Result<Self, ProctorError> {
        let (rows, cols) = array.dim();
        if rows < layout.points || cols < 2 {
            return Err(ProctorError::Landmarks(format!(
                "expected at least {}x2 landmarks, got {}x{}",
                layout.points, rows, cols
            )));
        }

        let point = |i: usize| Point::new(array[[i, 0]], array[[i, 1]]);

        Ok(Self {
            left_eye_outer: point(layout.left_eye_outer),
            right_eye_outer: point(layout.right_eye_outer),
            nose_tip: point(layout.nose_tip),
            chin: point(layout.chin),
            mouth_left: point(layout.mouth_left),
            mouth_right: point(layout.mouth_right),
        })
    }
}

/// Approximate head orientation (degrees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Yaw (left-right rotation), positive when the nose is right of center in the image
    pub yaw: f32,
    /// Pitch (up-down tilt), positive when looking down
    pub pitch: f32,
}

impl HeadPose {
    /// Whether the pose falls inside the looking cone
    pub fn within(&self, yaw_limit: f32, pitch_limit: f32) -> bool {
        self.yaw.abs() <= yaw_limit && self.pitch.abs() <= pitch_limit
    }
}

/// Estimate head pose from landmarks.
///
/// Coincident eye corners or a zero nose-to-chin distance yield `(0, 0)`.
pub fn estimate_head_pose(landmarks: &FaceLandmarks) -> HeadPose {
    let eye_distance = landmarks.left_eye_outer.distance(&landmarks.right_eye_outer);
    let nose_to_chin = landmarks.nose_tip.distance(&landmarks.chin);
    if !(eye_distance > f32::EPSILON) || !(nose_to_chin > f32::EPSILON) {
        return HeadPose::default();
    }

    let eye_mid = landmarks.left_eye_outer.midpoint(&landmarks.right_eye_outer);
    let yaw = (landmarks.nose_tip.x - eye_mid.x) / (eye_distance / 2.0) * YAW_SCALE_DEGREES;

    let mouth_mid = landmarks.mouth_left.midpoint(&landmarks.mouth_right);
    let eye_to_mouth = mouth_mid.y - eye_mid.y;
    let pitch = if eye_to_mouth.abs() > f32::EPSILON {
        let ratio = (landmarks.nose_tip.y - eye_mid.y) / eye_to_mouth;
        (ratio - PITCH_BASELINE_RATIO) * PITCH_SCALE_DEGREES
    } else {
        0.0
    };

    HeadPose { yaw, pitch }
}
