//! Violation Routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use violation_types::{AttemptViolations, ReportReceipt, ViolationReport};

use crate::error::ApiResult;
use crate::ledger::Requester;
use crate::AppState;

/// Response for the administrative clear
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub attempt_id: i64,
    pub removed: u64,
}

/// Record one violation
pub async fn report_violation(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<i64>,
    Json(report): Json<ViolationReport>,
) -> ApiResult<Json<ReportReceipt>> {
    Ok(Json(state.ledger.report(attempt_id, report).await?))
}

/// List violations for one attempt
pub async fn list_violations(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<i64>,
    requester: Requester,
) -> ApiResult<Json<AttemptViolations>> {
    Ok(Json(state.ledger.list(attempt_id, requester).await?))
}

/// Delete every violation of one attempt
pub async fn clear_violations(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<i64>,
    requester: Requester,
) -> ApiResult<Json<ClearResponse>> {
    let removed = state.ledger.clear(requester, attempt_id).await?;
    Ok(Json(ClearResponse { attempt_id, removed }))
}
