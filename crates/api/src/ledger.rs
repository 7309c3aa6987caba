//! Integrity ledger service
//!
//! Report, review and reviewer actions on top of the repository.

use crate::config::LedgerConfig;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use storage::{NewViolation, Repository};
use tracing::{info, warn};
use violation_types::{
    AttemptState, AttemptStatus, AttemptViolations, ReportReceipt, Role, Severity, ViolationReport,
    ViolationSummary,
};

/// Authenticated caller, as supplied by the authentication subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: i64,
    pub role: Role,
}

impl Requester {
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

/// Submission pipeline seam
#[async_trait]
pub trait AttemptFinalizer: Send + Sync {
    /// Submit an attempt. Returns false if it was no longer in progress.
    async fn finalize(&self, attempt_id: i64) -> ApiResult<bool>;
}

/// Marks the attempt submitted in the ledger database
pub struct RepositoryFinalizer {
    repo: Repository,
}

impl RepositoryFinalizer {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl AttemptFinalizer for RepositoryFinalizer {
    async fn finalize(&self, attempt_id: i64) -> ApiResult<bool> {
        Ok(self.repo.mark_submitted(attempt_id).await?)
    }
}

pub struct IntegrityLedger {
    repo: Repository,
    finalizer: Arc<dyn AttemptFinalizer>,
    config: LedgerConfig,
}

impl IntegrityLedger {
    pub fn new(repo: Repository, config: LedgerConfig) -> Self {
        Self {
            finalizer: Arc::new(RepositoryFinalizer::new(repo.clone())),
            repo,
            config,
        }
    }

    pub fn with_finalizer(mut self, finalizer: Arc<dyn AttemptFinalizer>) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Persist one report and evaluate the auto-submit threshold.
    ///
    /// Severity is classified from the attempt's count before this report
    /// unless the client supplied one.
    pub async fn report(&self, attempt_id: i64, report: ViolationReport) -> ApiResult<ReportReceipt> {
        let attempt = self
            .repo
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("attempt {}", attempt_id)))?;

        let severity = report
            .severity
            .unwrap_or_else(|| Severity::classify(report.violation_type, attempt.violation_count));

        let (violation_id, count) = self
            .repo
            .append_violation(&NewViolation {
                attempt_id,
                subject_id: attempt.student_id,
                violation_type: report.violation_type,
                detection_method: report.detection_method,
                severity,
                timestamp: report.timestamp.unwrap_or_else(Utc::now),
                details: report.details,
            })
            .await?;

        metrics::counter!(
            "integrity_violations_total",
            "type" => report.violation_type.as_str(),
            "severity" => severity.as_str()
        )
        .increment(1);

        let auto_submitted = if count >= self.config.auto_submit_threshold {
            self.apply_threshold(attempt_id, attempt.status, count).await
        } else {
            false
        };

        Ok(ReportReceipt {
            violation_id,
            violation_count: count,
            severity,
            auto_submitted,
        })
    }

    /// Past the threshold an in-progress attempt is finalized; an already
    /// submitted one still reports the directive so a retrying client stops.
    async fn apply_threshold(&self, attempt_id: i64, status: AttemptStatus, count: i64) -> bool {
        match status {
            AttemptStatus::InProgress => match self.finalizer.finalize(attempt_id).await {
                Ok(true) => {
                    info!(attempt_id, count, "Violation threshold reached, attempt auto-submitted");
                    metrics::counter!("integrity_auto_submits_total").increment(1);
                    true
                }
                // Submitted concurrently by another report
                Ok(false) => true,
                Err(e) => {
                    warn!(attempt_id, "Auto-submit failed: {}", e);
                    false
                }
            },
            AttemptStatus::Submitted => true,
            AttemptStatus::Invalidated => false,
        }
    }

    /// Violations of one attempt. Students may only list their own attempts.
    pub async fn list(&self, attempt_id: i64, requester: Requester) -> ApiResult<AttemptViolations> {
        let header = self
            .repo
            .attempt_header(attempt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("attempt {}", attempt_id)))?;

        if requester.is_student() && requester.user_id != header.attempt.student_id {
            warn!(attempt_id, user_id = requester.user_id, "Student listed another subject's violations");
            return Err(ApiError::Unauthorized(format!(
                "attempt {} belongs to another student",
                attempt_id
            )));
        }

        let violations = self.repo.list_violations(attempt_id).await?;
        Ok(AttemptViolations {
            attempt_id,
            subject_name: header.subject_name,
            quiz_name: header.quiz_name,
            total_violations: violations.len(),
            violations,
        })
    }

    /// Aggregate over every attempt of the reviewer's quizzes
    pub async fn summary(&self, reviewer: Requester, quiz_id: Option<i64>) -> ApiResult<ViolationSummary> {
        Self::require_reviewer(reviewer)?;
        let attempts = self.repo.attempts_for_teacher(reviewer.user_id, quiz_id).await?;
        Ok(ViolationSummary::from_attempts(attempts, self.config.suspicious_threshold))
    }

    pub async fn flag(&self, reviewer: Requester, attempt_id: i64, flagged: bool) -> ApiResult<AttemptState> {
        Self::require_reviewer(reviewer)?;
        let attempt = self.repo.set_flagged(attempt_id, flagged).await?;
        Ok(attempt.state())
    }

    pub async fn invalidate(&self, reviewer: Requester, attempt_id: i64) -> ApiResult<AttemptState> {
        Self::require_reviewer(reviewer)?;
        let attempt = self.repo.invalidate(attempt_id).await?;
        Ok(attempt.state())
    }

    /// Administrative delete-all for one attempt
    pub async fn clear(&self, requester: Requester, attempt_id: i64) -> ApiResult<u64> {
        if requester.role != Role::Admin {
            return Err(ApiError::Unauthorized("clearing a ledger requires the admin role".into()));
        }
        if self.repo.get_attempt(attempt_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("attempt {}", attempt_id)));
        }
        Ok(self.repo.clear_violations(attempt_id).await?)
    }

    fn require_reviewer(requester: Requester) -> ApiResult<()> {
        if requester.is_student() {
            return Err(ApiError::Unauthorized("reviewer role required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use violation_types::{detection, ViolationType};

    pub const TEACHER: Requester = Requester {
        user_id: 100,
        role: Role::Teacher,
    };
    pub const ADA: Requester = Requester {
        user_id: 1,
        role: Role::Student,
    };
    pub const GRACE: Requester = Requester {
        user_id: 2,
        role: Role::Student,
    };

    /// Reviewer 100 owns quiz 10; Ada (1) and Grace (2) each have an attempt
    pub async fn seeded(config: LedgerConfig) -> IntegrityLedger {
        let repo = Repository::in_memory().await.unwrap();
        repo.upsert_subject(1, "Ada", Role::Student).await.unwrap();
        repo.upsert_subject(2, "Grace", Role::Student).await.unwrap();
        repo.upsert_subject(100, "Prof. Turing", Role::Teacher).await.unwrap();
        repo.upsert_quiz(10, "Algorithms Midterm", 100).await.unwrap();
        repo.create_attempt(501, 10, 1).await.unwrap();
        repo.create_attempt(502, 10, 2).await.unwrap();
        IntegrityLedger::new(repo, config)
    }

    fn report(violation_type: ViolationType) -> ViolationReport {
        ViolationReport::new(violation_type, detection::BROWSER_EVENT).with_details(json!({ "key": "Ctrl+c" }))
    }

    #[tokio::test]
    async fn test_report_returns_running_count_and_severity() {
        let ledger = seeded(LedgerConfig::default()).await;

        let receipt = ledger.report(501, report(ViolationType::RightClick)).await.unwrap();
        assert_eq!(receipt.violation_count, 1);
        assert_eq!(receipt.severity, Severity::Low);
        assert!(!receipt.auto_submitted);

        let receipt = ledger.report(501, report(ViolationType::TabChange)).await.unwrap();
        assert_eq!(receipt.violation_count, 2);
        assert_eq!(receipt.severity, Severity::Medium);

        let mut explicit = report(ViolationType::RightClick);
        explicit.severity = Some(Severity::High);
        assert_eq!(ledger.report(501, explicit).await.unwrap().severity, Severity::High);

        let events = ledger.repository().list_violations(501).await.unwrap();
        assert_eq!(events[0].subject_id, 1);
        assert_eq!(events[0].details["key"], "Ctrl+c");
    }

    #[tokio::test]
    async fn test_report_unknown_attempt() {
        let ledger = seeded(LedgerConfig::default()).await;
        let err = ledger.report(999, report(ViolationType::CopyAttempt)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_threshold_auto_submits_once() {
        let ledger = seeded(LedgerConfig {
            auto_submit_threshold: 3,
            ..Default::default()
        })
        .await;

        assert!(!ledger.report(501, report(ViolationType::TabChange)).await.unwrap().auto_submitted);
        assert!(!ledger.report(501, report(ViolationType::TabChange)).await.unwrap().auto_submitted);
        assert!(ledger.report(501, report(ViolationType::TabChange)).await.unwrap().auto_submitted);

        let attempt = ledger.repository().get_attempt(501).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Submitted);

        // Later reports keep telling the client the attempt is closed
        assert!(ledger.report(501, report(ViolationType::TabChange)).await.unwrap().auto_submitted);
    }

    struct CountingFinalizer(AtomicU32);

    #[async_trait]
    impl AttemptFinalizer for CountingFinalizer {
        async fn finalize(&self, _attempt_id: i64) -> ApiResult<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Internal("pipeline down".into()))
        }
    }

    #[tokio::test]
    async fn test_finalizer_failure_keeps_report() {
        let finalizer = Arc::new(CountingFinalizer(AtomicU32::new(0)));
        let ledger = seeded(LedgerConfig {
            auto_submit_threshold: 1,
            ..Default::default()
        })
        .await
        .with_finalizer(finalizer.clone());

        let receipt = ledger.report(502, report(ViolationType::PasteAttempt)).await.unwrap();
        assert_eq!(receipt.violation_count, 1);
        assert!(!receipt.auto_submitted);
        assert_eq!(finalizer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidated_attempt_is_not_submitted() {
        let ledger = seeded(LedgerConfig {
            auto_submit_threshold: 1,
            ..Default::default()
        })
        .await;
        ledger.invalidate(TEACHER, 501).await.unwrap();

        let receipt = ledger.report(501, report(ViolationType::TabChange)).await.unwrap();
        assert!(!receipt.auto_submitted);
        let attempt = ledger.repository().get_attempt(501).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Invalidated);
    }

    #[tokio::test]
    async fn test_student_may_only_list_own_attempt() {
        let ledger = seeded(LedgerConfig::default()).await;
        ledger.report(501, report(ViolationType::TabChange)).await.unwrap();

        let err = ledger.list(501, GRACE).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let own = ledger.list(501, ADA).await.unwrap();
        assert_eq!(own.subject_name, "Ada");
        assert_eq!(own.quiz_name, "Algorithms Midterm");
        assert_eq!(own.total_violations, 1);

        // Any non-student role is authorized
        assert!(ledger.list(501, TEACHER).await.is_ok());
        let other = Requester {
            user_id: 77,
            role: Role::Other,
        };
        assert!(ledger.list(501, other).await.is_ok());
    }

    #[tokio::test]
    async fn test_summary_histogram_and_suspicious_count() {
        let ledger = seeded(LedgerConfig::default()).await;
        for t in [ViolationType::TabChange, ViolationType::TabChange, ViolationType::NoFace] {
            ledger.report(501, report(t)).await.unwrap();
        }
        ledger.report(502, report(ViolationType::RightClick)).await.unwrap();

        let summary = ledger.summary(TEACHER, None).await.unwrap();
        assert_eq!(summary.total_violations, 4);
        assert_eq!(summary.suspicious_attempt_count, 1);
        assert_eq!(summary.by_type[&ViolationType::TabChange], 2);
        assert_eq!(summary.attempts.len(), 2);

        ledger.flag(TEACHER, 502, true).await.unwrap();
        assert_eq!(ledger.summary(TEACHER, Some(10)).await.unwrap().suspicious_attempt_count, 2);

        assert!(matches!(ledger.summary(ADA, None).await, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_reviewer_actions_are_idempotent() {
        let ledger = seeded(LedgerConfig::default()).await;

        let first = ledger.flag(TEACHER, 501, true).await.unwrap();
        assert_eq!(ledger.flag(TEACHER, 501, true).await.unwrap(), first);

        let first = ledger.invalidate(TEACHER, 502).await.unwrap();
        let second = ledger.invalidate(TEACHER, 502).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, AttemptStatus::Invalidated);

        assert!(matches!(ledger.invalidate(ADA, 501).await, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_clear_requires_admin() {
        let ledger = seeded(LedgerConfig::default()).await;
        ledger.report(501, report(ViolationType::TabChange)).await.unwrap();

        assert!(matches!(ledger.clear(TEACHER, 501).await, Err(ApiError::Unauthorized(_))));

        let admin = Requester {
            user_id: 1000,
            role: Role::Admin,
        };
        assert_eq!(ledger.clear(admin, 501).await.unwrap(), 1);
        assert!(matches!(ledger.clear(admin, 999).await, Err(ApiError::NotFound(_))));
    }
}
