//! Violation ledger: append-only event rows per attempt

use crate::repository::{AttemptRecord, Repository};
use crate::StorageError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};
use violation_types::{AttemptSummary, Severity, ViolationEvent, ViolationType};

/// A violation accepted for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewViolation {
    pub attempt_id: i64,
    pub subject_id: i64,
    pub violation_type: ViolationType,
    pub detection_method: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

const VIOLATION_COLUMNS: &str =
    "v.id, v.attempt_id, v.student_id, v.violation_type, v.detection_method, v.severity, v.timestamp_ms, v.details";

fn violation_from_row(row: &SqliteRow) -> Result<ViolationEvent, StorageError> {
    let violation_type: String = row.try_get("violation_type")?;
    let severity: String = row.try_get("severity")?;
    let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
    let details: String = row.try_get("details")?;

    Ok(ViolationEvent {
        id: row.try_get("id")?,
        attempt_id: row.try_get("attempt_id")?,
        subject_id: row.try_get("student_id")?,
        violation_type: ViolationType::from_str(&violation_type)?,
        detection_method: row.try_get("detection_method")?,
        severity: Severity::from_str(&severity)?,
        timestamp: DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            StorageError::SerializationError(format!("timestamp out of range: {}", timestamp_ms))
        })?,
        details: serde_json::from_str(&details)?,
    })
}

impl Repository {
    /// Append one event and recompute the attempt's cached count.
    ///
    /// Insert and recount share a transaction, so the cached counter equals
    /// the ledger count after every commit. Returns `(violation_id, count)`.
    pub async fn append_violation(&self, violation: &NewViolation) -> Result<(i64, i64), StorageError> {
        let details = serde_json::to_string(&violation.details)?;
        let mut tx = self.pool.begin().await?;

        // Insert first: the write lock is taken before any read in this transaction
        let result = sqlx::query(
            r#"
            INSERT INTO violations
                (attempt_id, student_id, violation_type, detection_method, severity, timestamp_ms, details)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(violation.attempt_id)
        .bind(violation.subject_id)
        .bind(violation.violation_type.as_str())
        .bind(&violation.detection_method)
        .bind(violation.severity.as_str())
        .bind(violation.timestamp.timestamp_millis())
        .bind(details)
        .execute(&mut *tx)
        .await?;
        let violation_id = result.last_insert_rowid();

        sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET violation_count = (SELECT COUNT(*) FROM violations WHERE attempt_id = ?)
            WHERE id = ?
            "#,
        )
        .bind(violation.attempt_id)
        .bind(violation.attempt_id)
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM violations WHERE attempt_id = ?")
            .bind(violation.attempt_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(
            attempt_id = violation.attempt_id,
            violation_id,
            count,
            violation_type = %violation.violation_type,
            "Violation appended"
        );
        Ok((violation_id, count))
    }

    /// Count ledger rows for an attempt
    pub async fn count_violations(&self, attempt_id: i64) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM violations WHERE attempt_id = ?")
            .bind(attempt_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Events for one attempt, oldest first
    pub async fn list_violations(&self, attempt_id: i64) -> Result<Vec<ViolationEvent>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM violations v WHERE v.attempt_id = ? ORDER BY v.timestamp_ms, v.id",
            VIOLATION_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(violation_from_row).collect()
    }

    /// Attempts of a reviewer's quizzes with their violations.
    ///
    /// Covers attempts with at least one violation, plus flagged attempts.
    pub async fn attempts_for_teacher(
        &self,
        teacher_id: i64,
        quiz_id: Option<i64>,
    ) -> Result<Vec<AttemptSummary>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.quiz_id, a.student_id, a.status, a.is_flagged, a.violation_count,
                   q.title AS quiz_name, COALESCE(u.name, '') AS subject_name
            FROM quiz_attempts a
            JOIN quizzes q ON q.id = a.quiz_id
            LEFT JOIN users u ON u.id = a.student_id
            WHERE q.teacher_id = ?
              AND (? IS NULL OR a.quiz_id = ?)
              AND (a.is_flagged = 1 OR EXISTS (SELECT 1 FROM violations v WHERE v.attempt_id = a.id))
            ORDER BY a.id
            "#,
        )
        .bind(teacher_id)
        .bind(quiz_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<i64, Vec<ViolationEvent>> = BTreeMap::new();
        let violation_rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM violations v
            JOIN quiz_attempts a ON a.id = v.attempt_id
            JOIN quizzes q ON q.id = a.quiz_id
            WHERE q.teacher_id = ? AND (? IS NULL OR a.quiz_id = ?)
            ORDER BY v.attempt_id, v.timestamp_ms, v.id
            "#,
            VIOLATION_COLUMNS
        ))
        .bind(teacher_id)
        .bind(quiz_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &violation_rows {
            let event = violation_from_row(row)?;
            grouped.entry(event.attempt_id).or_default().push(event);
        }

        rows.iter()
            .map(|row| -> Result<AttemptSummary, StorageError> {
                let attempt = AttemptRecord::from_row(row)?;
                let violations = grouped.remove(&attempt.id).unwrap_or_default();
                Ok(AttemptSummary {
                    attempt_id: attempt.id,
                    quiz_id: attempt.quiz_id,
                    quiz_name: row.try_get("quiz_name")?,
                    subject_id: attempt.student_id,
                    subject_name: row.try_get("subject_name")?,
                    status: attempt.status,
                    is_flagged: attempt.is_flagged,
                    violation_count: violations.len(),
                    violations,
                })
            })
            .collect()
    }

    /// Administrative delete-all for one attempt; resets the cached count.
    /// Returns the number of rows removed.
    pub async fn clear_violations(&self, attempt_id: i64) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM violations WHERE attempt_id = ?")
            .bind(attempt_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("UPDATE quiz_attempts SET violation_count = 0 WHERE id = ?")
            .bind(attempt_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(attempt_id, removed, "Ledger cleared");
        Ok(removed)
    }
}
