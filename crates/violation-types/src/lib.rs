//! Violation Types
//!
//! Types shared by the monitoring client and the violation ledger:
//! - Violation classification and severity
//! - Ledger records and report receipts
//! - Attempt status and requester roles
//! - Review read models

mod review;
mod severity;

pub use review::{AttemptState, AttemptSummary, AttemptViolations, ViolationSummary};
pub use severity::Severity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Detection method tags
pub mod detection {
    /// Page-level interaction channel (visibility, clipboard, keys)
    pub const BROWSER_EVENT: &str = "browser_event";
    /// Camera sampling through the head-pose heuristic
    pub const CAMERA_HEURISTIC: &str = "camera_heuristic";
}

/// Parse errors for wire-level enums
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown violation type: {0}")]
    ViolationType(String),

    #[error("Unknown severity: {0}")]
    Severity(String),

    #[error("Unknown attempt status: {0}")]
    AttemptStatus(String),
}

/// Violation classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Tab or window hidden
    TabChange,
    /// Clipboard copy intercepted
    CopyAttempt,
    /// Clipboard paste intercepted
    PasteAttempt,
    /// Context menu suppressed
    RightClick,
    /// Recognized key combination
    KeyboardShortcut,
    /// Print-screen style combination
    ScreenshotAttempt,
    /// Face detected but turned away
    FaceAway,
    /// No face in frame
    NoFace,
}

impl ViolationType {
    pub const ALL: [ViolationType; 8] = [
        ViolationType::TabChange,
        ViolationType::CopyAttempt,
        ViolationType::PasteAttempt,
        ViolationType::RightClick,
        ViolationType::KeyboardShortcut,
        ViolationType::ScreenshotAttempt,
        ViolationType::FaceAway,
        ViolationType::NoFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::TabChange => "tab_change",
            ViolationType::CopyAttempt => "copy_attempt",
            ViolationType::PasteAttempt => "paste_attempt",
            ViolationType::RightClick => "right_click",
            ViolationType::KeyboardShortcut => "keyboard_shortcut",
            ViolationType::ScreenshotAttempt => "screenshot_attempt",
            ViolationType::FaceAway => "face_away",
            ViolationType::NoFace => "no_face",
        }
    }

    /// Whether the violation comes from the camera rather than a page event
    pub fn is_camera(&self) -> bool {
        matches!(self, ViolationType::FaceAway | ViolationType::NoFace)
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::ViolationType(s.to_string()))
    }
}

/// Quiz attempt status, as far as this subsystem observes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    InProgress,
    Submitted,
    /// Terminal, reachable only through reviewer action
    Invalidated,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Invalidated => "invalidated",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "invalidated" => Ok(AttemptStatus::Invalidated),
            other => Err(ParseError::AttemptStatus(other.to_string())),
        }
    }
}

/// Requester role supplied by the authentication subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    /// Any role this subsystem does not distinguish
    Other,
}

impl Role {
    /// Parse a role name; unknown names map to [`Role::Other`]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Role::Student,
            "teacher" => Role::Teacher,
            "admin" => Role::Admin,
            _ => Role::Other,
        }
    }
}

/// Persisted violation record (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationEvent {
    pub id: i64,
    pub attempt_id: i64,
    pub subject_id: i64,
    pub violation_type: ViolationType,
    pub detection_method: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Opaque metadata, stored and surfaced but never interpreted
    pub details: serde_json::Value,
}

/// Report body sent by the monitoring client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub violation_type: ViolationType,
    pub detection_method: String,
    /// Client override; classified at report time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Detection time; the server clock is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ViolationReport {
    pub fn new(violation_type: ViolationType, detection_method: impl Into<String>) -> Self {
        Self {
            violation_type,
            detection_method: detection_method.into(),
            severity: None,
            timestamp: Some(Utc::now()),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Ledger response to an accepted report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportReceipt {
    pub violation_id: i64,
    /// Ledger count for the attempt after this report
    pub violation_count: i64,
    pub severity: Severity,
    /// Set when the server finalized the attempt because of this report
    #[serde(default)]
    pub auto_submitted: bool,
}
