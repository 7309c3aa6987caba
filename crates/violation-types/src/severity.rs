//! Severity mapping

use crate::{ParseError, ViolationType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prior violations on the attempt before severity escalates one level
pub const ESCALATE_AFTER: i64 = 5;

/// Prior violations on the attempt before severity is always high
pub const HIGH_AFTER: i64 = 10;

/// Violation severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Classify a violation at report time from its type and the number of
    /// violations already in the ledger for the attempt.
    pub fn classify(violation_type: ViolationType, prior_count: i64) -> Self {
        let base = match violation_type {
            ViolationType::TabChange
            | ViolationType::ScreenshotAttempt
            | ViolationType::PasteAttempt
            | ViolationType::NoFace => Severity::Medium,
            ViolationType::FaceAway
            | ViolationType::CopyAttempt
            | ViolationType::RightClick
            | ViolationType::KeyboardShortcut => Severity::Low,
        };

        if prior_count >= HIGH_AFTER {
            Severity::High
        } else if prior_count >= ESCALATE_AFTER {
            base.escalate()
        } else {
            base
        }
    }

    fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium | Severity::High => Severity::High,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(ParseError::Severity(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_baseline_levels() {
        assert_eq!(Severity::classify(ViolationType::TabChange, 0), Severity::Medium);
        assert_eq!(Severity::classify(ViolationType::RightClick, 0), Severity::Low);
        assert_eq!(Severity::classify(ViolationType::NoFace, 0), Severity::Medium);
    }

    #[test]
    fn test_repeat_offences_escalate() {
        assert_eq!(Severity::classify(ViolationType::RightClick, 5), Severity::Medium);
        assert_eq!(Severity::classify(ViolationType::TabChange, 5), Severity::High);
        assert_eq!(Severity::classify(ViolationType::RightClick, 10), Severity::High);
    }

    proptest! {
        #[test]
        fn severity_never_decreases_with_count(idx in 0usize..8, a in 0i64..50, b in 0i64..50) {
            let t = ViolationType::ALL[idx];
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Severity::classify(t, lo) <= Severity::classify(t, hi));
        }
    }
}
