//! HTTP route handlers

pub mod review;
pub mod violations;

use crate::error::ApiError;
use crate::ledger::Requester;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use violation_types::Role;

/// Caller id header set by the authentication gateway
pub const USER_ID_HEADER: &str = "x-user-id";
/// Caller role header set by the authentication gateway
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", USER_ID_HEADER)))?
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::BadRequest(format!("invalid {} header", USER_ID_HEADER)))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Role::parse)
            .unwrap_or(Role::Other);

        Ok(Requester { user_id, role })
    }
}
