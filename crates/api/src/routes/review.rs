//! Review Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use violation_types::{AttemptState, ViolationSummary};

use crate::error::ApiResult;
use crate::ledger::Requester;
use crate::AppState;

/// Query parameters for the summary endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    /// Restrict to one quiz
    pub quiz_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    #[serde(default = "default_flagged")]
    pub flagged: bool,
}

fn default_flagged() -> bool {
    true
}

/// Reviewer summary over their quizzes
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
    reviewer: Requester,
) -> ApiResult<Json<ViolationSummary>> {
    Ok(Json(state.ledger.summary(reviewer, params.quiz_id).await?))
}

/// Flag (or with `{"flagged": false}` unflag) an attempt
pub async fn flag_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<i64>,
    reviewer: Requester,
    body: Option<Json<FlagRequest>>,
) -> ApiResult<Json<AttemptState>> {
    let flagged = body.map_or(true, |Json(req)| req.flagged);
    Ok(Json(state.ledger.flag(reviewer, attempt_id, flagged).await?))
}

/// Invalidate an attempt
pub async fn invalidate_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<i64>,
    reviewer: Requester,
) -> ApiResult<Json<AttemptState>> {
    Ok(Json(state.ledger.invalidate(reviewer, attempt_id).await?))
}
