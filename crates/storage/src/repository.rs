//! Repository Implementation

use crate::StorageError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use violation_types::{AttemptState, AttemptStatus, Role};

/// Quiz attempt as seen by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub status: AttemptStatus,
    pub is_flagged: bool,
    /// Cached ledger count
    pub violation_count: i64,
}

impl AttemptRecord {
    pub fn state(&self) -> AttemptState {
        AttemptState {
            attempt_id: self.id,
            status: self.status,
            is_flagged: self.is_flagged,
            violation_count: self.violation_count,
        }
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            quiz_id: row.try_get("quiz_id")?,
            student_id: row.try_get("student_id")?,
            status: AttemptStatus::from_str(&status)?,
            is_flagged: row.try_get("is_flagged")?,
            violation_count: row.try_get("violation_count")?,
        })
    }
}

/// Attempt with the display names a reviewer sees
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptHeader {
    pub attempt: AttemptRecord,
    pub subject_name: String,
    pub quiz_name: String,
    pub teacher_id: i64,
}

/// Repository for ledger data access
#[derive(Debug, Clone)]
pub struct Repository {
    pub(crate) pool: SqlitePool,
}

const ATTEMPT_COLUMNS: &str = "a.id, a.quiz_id, a.student_id, a.status, a.is_flagged, a.violation_count";

impl Repository {
    /// Open (creating if missing) a SQLite database and initialize the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Connected to ledger database: {}", url);
        let repo = Self { pool };
        repo.initialize_schema().await?;
        Ok(repo)
    }

    /// Private in-memory database. One connection, kept for the pool's lifetime.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize_schema().await?;
        Ok(repo)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                teacher_id INTEGER NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS quizzes_teacher_id ON quizzes(teacher_id);"#,
            r#"
            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id INTEGER PRIMARY KEY,
                quiz_id INTEGER NOT NULL,
                student_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress',
                is_flagged BOOLEAN NOT NULL DEFAULT 0,
                violation_count INTEGER NOT NULL DEFAULT 0
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS quiz_attempts_quiz_id ON quiz_attempts(quiz_id);"#,
            r#"
            CREATE TABLE IF NOT EXISTS violations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attempt_id INTEGER NOT NULL,
                student_id INTEGER NOT NULL,
                violation_type TEXT NOT NULL,
                detection_method TEXT NOT NULL,
                severity TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                details TEXT NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS violations_attempt_id ON violations(attempt_id, timestamp_ms);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Register or rename a user
    pub async fn upsert_subject(&self, id: i64, name: &str, role: Role) -> Result<(), StorageError> {
        let role = match role {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::Other => "other",
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, name, role) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Register or update a quiz and its owning reviewer
    pub async fn upsert_quiz(&self, id: i64, title: &str, teacher_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, title, teacher_id) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title, teacher_id = excluded.teacher_id
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(teacher_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Start an attempt in `in_progress`
    pub async fn create_attempt(&self, id: i64, quiz_id: i64, student_id: i64) -> Result<AttemptRecord, StorageError> {
        sqlx::query("INSERT INTO quiz_attempts (id, quiz_id, student_id) VALUES (?, ?, ?)")
            .bind(id)
            .bind(quiz_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        debug!(attempt_id = id, quiz_id, student_id, "Attempt created");
        self.get_attempt(id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get_attempt(&self, attempt_id: i64) -> Result<Option<AttemptRecord>, StorageError> {
        let row = sqlx::query(&format!("SELECT {} FROM quiz_attempts a WHERE a.id = ?", ATTEMPT_COLUMNS))
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(AttemptRecord::from_row).transpose()
    }

    /// Attempt with owner and quiz display names
    pub async fn attempt_header(&self, attempt_id: i64) -> Result<Option<AttemptHeader>, StorageError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}, COALESCE(u.name, '') AS subject_name, COALESCE(q.title, '') AS quiz_name,
                   COALESCE(q.teacher_id, 0) AS teacher_id
            FROM quiz_attempts a
            LEFT JOIN users u ON u.id = a.student_id
            LEFT JOIN quizzes q ON q.id = a.quiz_id
            WHERE a.id = ?
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(AttemptHeader {
                attempt: AttemptRecord::from_row(&row)?,
                subject_name: row.try_get("subject_name")?,
                quiz_name: row.try_get("quiz_name")?,
                teacher_id: row.try_get("teacher_id")?,
            })),
            None => Ok(None),
        }
    }

    /// Set the reviewer flag. Setting it to its current value is a no-op.
    pub async fn set_flagged(&self, attempt_id: i64, flagged: bool) -> Result<AttemptRecord, StorageError> {
        let result = sqlx::query("UPDATE quiz_attempts SET is_flagged = ? WHERE id = ?")
            .bind(flagged)
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        info!(attempt_id, flagged, "Attempt flag updated");
        self.get_attempt(attempt_id).await?.ok_or(StorageError::NotFound)
    }

    /// Move an attempt to the terminal `invalidated` status and flag it
    pub async fn invalidate(&self, attempt_id: i64) -> Result<AttemptRecord, StorageError> {
        let result = sqlx::query("UPDATE quiz_attempts SET status = ?, is_flagged = 1 WHERE id = ?")
            .bind(AttemptStatus::Invalidated.as_str())
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        info!(attempt_id, "Attempt invalidated");
        self.get_attempt(attempt_id).await?.ok_or(StorageError::NotFound)
    }

    /// Submit an attempt still in progress. Returns false if it already left `in_progress`.
    pub async fn mark_submitted(&self, attempt_id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE quiz_attempts SET status = ? WHERE id = ? AND status = ?")
            .bind(AttemptStatus::Submitted.as_str())
            .bind(attempt_id)
            .bind(AttemptStatus::InProgress.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
