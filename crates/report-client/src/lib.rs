//! Violation Reporting Client
//!
//! Delivers violations from a monitoring session to the ledger:
//! - One report per firing, never retried
//! - Failures logged and swallowed so the monitored user is not tipped off
//! - Server auto-submit directive stops monitoring and redirects to results

pub mod client;
pub mod reporter;

pub use client::{ReportingClient, ViolationSink};
pub use reporter::{FinishReason, Reporter, ReporterOutcome, SessionHost};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Reporting client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Attempt finalization failed: {0}")]
    Finalize(String),
}

impl ClientError {
    /// Rejected by the ledger's authorization rule
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, ClientError::Server { code: Some(code), .. } if code == "NOT_AUTHORIZED")
    }
}

/// Reporting client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger server base URL
    pub base_url: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// User agent sent with every report
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 10,
            user_agent: Some(concat!("exam-integrity/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
