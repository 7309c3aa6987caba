//! HTTP client for the violation ledger

use crate::{ClientConfig, ClientError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use violation_types::{ReportReceipt, ViolationReport};

/// Destination for violation reports
#[async_trait]
pub trait ViolationSink: Send + Sync {
    async fn report(&self, attempt_id: i64, report: &ViolationReport) -> Result<ReportReceipt, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// HTTP client for the ledger server
pub struct ReportingClient {
    client: Client,
    base_url: String,
}

impl ReportingClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder().timeout(config.timeout());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn violations_url(&self, attempt_id: i64) -> String {
        format!("{}/api/v1/attempts/{}/violations", self.base_url, attempt_id)
    }

    /// Send one report and read back the running count
    pub async fn report_violation(
        &self,
        attempt_id: i64,
        report: &ViolationReport,
    ) -> Result<ReportReceipt, ClientError> {
        let url = self.violations_url(attempt_id);
        debug!(%url, violation_type = %report.violation_type, "Sending violation report");
        let response = self.client.post(&url).json(report).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (Some(body.code), body.error),
            Err(_) => (None, text),
        };
        Err(ClientError::Server {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[async_trait]
impl ViolationSink for ReportingClient {
    async fn report(&self, attempt_id: i64, report: &ViolationReport) -> Result<ReportReceipt, ClientError> {
        self.report_violation(attempt_id, report).await
    }
}
