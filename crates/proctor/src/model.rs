//! ONNX landmark model adapter
//!
//! Runs a single-face landmark model (face mesh or 68-point) on each frame.
//! Output 0 holds `points * k` coordinates in model input pixels, with
//! `k >= 2` (x, y, optionally z). An optional output 1 holds a face presence
//! logit.

use crate::detector::LandmarkDetector;
use crate::pose::{FaceLandmarks, LandmarkLayout};
use crate::{ProctorConfig, ProctorError};
use camera_capture::VideoFrame;
use image::imageops::{self, FilterType};
use ndarray::{Array2, Array4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{error, info, warn};

/// Mean luminance below which the lens is treated as covered
pub const DARK_FRAME_LUMA: f32 = 8.0;

/// Face presence probability below which the frame has no face
pub const FACE_PRESENCE_THRESHOLD: f32 = 0.5;

pub struct OnnxLandmarkDetector {
    session: Option<Session>,
    input_size: u32,
    layout: LandmarkLayout,
}

impl OnnxLandmarkDetector {
    /// Load the configured model. Without a model path the detector still
    /// constructs, but every non-dark frame fails detection.
    pub fn new(config: &ProctorConfig, layout: LandmarkLayout) -> Result<Self, ProctorError> {
        let session = match &config.landmark_model_path {
            Some(path) => {
                info!("Loading landmark model from {}", path);
                let session = Session::builder()
                    .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                    .and_then(|b| b.commit_from_file(path))
                    .map_err(|e| {
                        error!("Failed to load landmark model: {}", e);
                        ProctorError::ModelLoad(e.to_string())
                    })?;
                Some(session)
            }
            None => {
                warn!("No landmark model configured, camera ticks will be skipped");
                None
            }
        };

        Ok(Self {
            session,
            input_size: config.landmark_input_size,
            layout,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, ProctorError> {
        if is_dark(frame) {
            return Ok(None);
        }

        let size = self.input_size;
        let layout = self.layout;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ProctorError::Config("no landmark model loaded".into()))?;

        let input = preprocess(frame, size)?;
        let tensor = Tensor::from_array(input).map_err(|e| ProctorError::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor].map_err(|e| ProctorError::Inference(e.to_string()))?)
            .map_err(|e| ProctorError::Inference(e.to_string()))?;

        if outputs.len() > 1 {
            let logit = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| ProctorError::Inference(e.to_string()))?
                .iter()
                .copied()
                .next()
                .unwrap_or(f32::NEG_INFINITY);
            if sigmoid(logit) < FACE_PRESENCE_THRESHOLD {
                return Ok(None);
            }
        }

        let raw: Vec<f32> = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProctorError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        decode_landmarks(raw, frame, size, &layout).map(Some)
    }
}

/// Whether the frame is too dark to hold a face
pub fn is_dark(frame: &VideoFrame) -> bool {
    let luma = frame.to_grayscale();
    if luma.is_empty() {
        return true;
    }
    let mean = luma.iter().map(|&v| v as f32).sum::<f32>() / luma.len() as f32;
    mean < DARK_FRAME_LUMA
}

/// Resize to the model input and lay out as NCHW in `[0, 1]`
pub fn preprocess(frame: &VideoFrame, size: u32) -> Result<Array4<f32>, ProctorError> {
    let img = frame.to_rgb_image()?;
    let resized = imageops::resize(&img, size, size, FilterType::Triangle);

    let side = size as usize;
    let mut input = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    Ok(input)
}

/// Scale raw model coordinates back to frame pixels and pick the named points
pub fn decode_landmarks(
    raw: Vec<f32>,
    frame: &VideoFrame,
    input_size: u32,
    layout: &LandmarkLayout,
) -> Result<FaceLandmarks, ProctorError> {
    if layout.points == 0 || raw.len() % layout.points != 0 {
        return Err(ProctorError::Landmarks(format!(
            "{} values do not split into {} points",
            raw.len(),
            layout.points
        )));
    }
    let stride = raw.len() / layout.points;

    let mut points = Array2::from_shape_vec((layout.points, stride), raw)
        .map_err(|e| ProctorError::Landmarks(e.to_string()))?;

    let scale_x = frame.width as f32 / input_size as f32;
    let scale_y = frame.height as f32 / input_size as f32;
    if stride >= 2 {
        points.column_mut(0).mapv_inplace(|x| x * scale_x);
        points.column_mut(1).mapv_inplace(|y| y * scale_y);
    }

    FaceLandmarks::from_array(points.view(), layout)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
