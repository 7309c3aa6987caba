//! Proctor configuration

use crate::ProctorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attention monitoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Camera sampling interval (milliseconds)
    pub tick_interval_ms: u64,

    /// Smoothing window length (samples)
    pub smoothing_window: usize,

    /// Looking samples required in the window to count as looking
    pub smoothing_majority: usize,

    /// Continuous away time before a violation is counted (milliseconds)
    pub grace_period_ms: u64,

    /// Continuous away time that triggers auto-submit (seconds)
    pub away_limit_secs: u64,

    /// Maximum absolute yaw still classified as looking (degrees)
    pub yaw_limit_degrees: f32,

    /// Maximum absolute pitch still classified as looking (degrees)
    pub pitch_limit_degrees: f32,

    /// ONNX landmark model; without one every tick is skipped
    #[serde(default)]
    pub landmark_model_path: Option<String>,

    /// Square input side the landmark model expects (pixels)
    #[serde(default = "default_landmark_input_size")]
    pub landmark_input_size: u32,
}

fn default_landmark_input_size() -> u32 {
    192
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            smoothing_window: 5,
            smoothing_majority: 3,
            grace_period_ms: 2000,
            away_limit_secs: 60,
            yaw_limit_degrees: 30.0,
            pitch_limit_degrees: 25.0,
            landmark_model_path: None,
            landmark_input_size: default_landmark_input_size(),
        }
    }
}

impl ProctorConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            grace_period_ms: 1000,
            away_limit_secs: 30,
            yaw_limit_degrees: 20.0,
            pitch_limit_degrees: 15.0,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            grace_period_ms: 4000,
            away_limit_secs: 120,
            yaw_limit_degrees: 40.0,
            pitch_limit_degrees: 35.0,
            ..Default::default()
        }
    }

    /// Reject settings the state machine cannot honor
    pub fn validate(&self) -> Result<(), ProctorError> {
        if self.smoothing_window == 0 {
            return Err(ProctorError::Config("smoothing_window must be at least 1".into()));
        }
        if self.smoothing_majority == 0 || self.smoothing_majority > self.smoothing_window {
            return Err(ProctorError::Config(format!(
                "smoothing_majority must be in 1..={}",
                self.smoothing_window
            )));
        }
        if self.landmark_input_size == 0 {
            return Err(ProctorError::Config("landmark_input_size must be positive".into()));
        }
        if self.away_limit() <= self.grace_period() {
            return Err(ProctorError::Config(
                "away_limit_secs must exceed the grace period".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn away_limit(&self) -> Duration {
        Duration::from_secs(self.away_limit_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProctorConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert_eq!(config.away_limit(), Duration::from_secs(60));
        assert_eq!((config.smoothing_window, config.smoothing_majority), (5, 3));
    }

    #[test]
    fn test_presets_order() {
        assert!(ProctorConfig::strict().grace_period() < ProctorConfig::lenient().grace_period());
        assert!(ProctorConfig::strict().yaw_limit_degrees < ProctorConfig::default().yaw_limit_degrees);
    }

    #[test]
    fn test_validate() {
        assert!(ProctorConfig::default().validate().is_ok());
        assert!(ProctorConfig::strict().validate().is_ok());
        assert!(ProctorConfig::lenient().validate().is_ok());

        let bad = ProctorConfig {
            smoothing_majority: 6,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ProctorError::Config(_))));

        let bad = ProctorConfig {
            grace_period_ms: 90_000,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
