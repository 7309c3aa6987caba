//! Reviewer-facing read models

use crate::{AttemptStatus, ViolationEvent, ViolationType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Violations recorded for a single attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptViolations {
    pub attempt_id: i64,
    pub subject_name: String,
    pub quiz_name: String,
    pub total_violations: usize,
    /// Ordered by timestamp, then insertion order
    pub violations: Vec<ViolationEvent>,
}

/// One attempt's entry in a reviewer summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub quiz_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub status: AttemptStatus,
    pub is_flagged: bool,
    pub violation_count: usize,
    pub violations: Vec<ViolationEvent>,
}

/// Aggregate over every attempt of a reviewer's quizzes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSummary {
    pub total_violations: usize,
    pub suspicious_attempt_count: usize,
    pub by_type: BTreeMap<ViolationType, usize>,
    pub attempts: Vec<AttemptSummary>,
}

impl ViolationSummary {
    /// Build a summary from per-attempt groups.
    ///
    /// An attempt is suspicious when it is flagged or has at least
    /// `suspicious_threshold` violations.
    pub fn from_attempts(attempts: Vec<AttemptSummary>, suspicious_threshold: usize) -> Self {
        let mut by_type = BTreeMap::new();
        let mut total_violations = 0;
        let mut suspicious_attempt_count = 0;

        for attempt in &attempts {
            total_violations += attempt.violations.len();
            for v in &attempt.violations {
                *by_type.entry(v.violation_type).or_insert(0) += 1;
            }
            if attempt.is_flagged || attempt.violation_count >= suspicious_threshold {
                suspicious_attempt_count += 1;
            }
        }

        Self {
            total_violations,
            suspicious_attempt_count,
            by_type,
            attempts,
        }
    }
}

/// Attempt flags after a reviewer action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptState {
    pub attempt_id: i64,
    pub status: AttemptStatus,
    pub is_flagged: bool,
    pub violation_count: i64,
}
