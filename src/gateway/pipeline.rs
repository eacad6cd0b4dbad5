//! Per-route request stages: authenticate, authorize(min role), validate.
//!
//! Handlers call these in order and return on the first failure, so a caller
//! with a bad token never reaches validation and invalid input never reaches
//! the inventory.

use super::AppState;
use crate::auth::{Caller, Identity, Role};
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde_json::Value;

/// Extract bearer token from Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Stage 1: prove identity from the bearer token.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthenticated)?;
    state.authenticator.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        ApiError::from(e)
    })
}

/// Stage 2: gate on the minimum role for the route.
pub fn authorize(state: &AppState, identity: &Identity, min_role: Role) -> Result<Caller, ApiError> {
    Ok(state.authorizer.authorize(&identity.username, min_role)?)
}

/// Stages 1 and 2 together.
pub fn require(state: &AppState, headers: &HeaderMap, min_role: Role) -> Result<Caller, ApiError> {
    let identity = authenticate(state, headers)?;
    authorize(state, &identity, min_role)
}

/// Stage 3 entry: turn the JSON extractor result into a value, or 400.
pub fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            Err(ApiError::InvalidArgument(format!(
                "Invalid request: {}",
                rejection.body_text()
            )))
        }
    }
}
