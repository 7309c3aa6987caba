//! Storage Layer
//!
//! SQLite persistence for the violation ledger with repository pattern.
//! Subjects, quizzes and attempts are owned by other subsystems; the
//! repository keeps just enough of them to join reviewer queries.

mod ledger;
mod repository;

pub use ledger::NewViolation;
pub use repository::{AttemptHeader, AttemptRecord, Repository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}

impl From<violation_types::ParseError> for StorageError {
    fn from(e: violation_types::ParseError) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}
