//! HTTP-facing error taxonomy.
//!
//! Every handler failure ends up here. The body is always `{"message": ...}`
//! (plus `errors` for field validation); internal faults are logged with full
//! detail and answered with a generic message.

use crate::auth::AuthError;
use crate::inventory::{FieldErrors, InventoryError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const INTERNAL_MESSAGE: &str = "internal server error";
pub const UNAUTHENTICATED_MESSAGE: &str = "Missing or invalid token";
pub const FORBIDDEN_MESSAGE: &str = "Forbidden: insufficient role";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Validation errors")]
    Validation(FieldErrors),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("Missing or invalid token")]
    Unauthenticated,

    #[error("Forbidden: insufficient role")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation. Answered with 400, not 409.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::Validation(_) | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => serde_json::json!({
                "message": "Validation errors",
                "errors": errors,
            }),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "Unhandled error while serving request");
                serde_json::json!({"message": INTERNAL_MESSAGE})
            }
            other => serde_json::json!({"message": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Unauthenticated(_) => Self::Unauthenticated,
            AuthError::Forbidden { .. } => Self::Forbidden,
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidArgument(message) => Self::InvalidArgument(message),
            e @ InventoryError::StoreNotFound(_) => Self::NotFound(e.to_string()),
            e @ InventoryError::Conflict { .. } => Self::Conflict(e.to_string()),
            e @ (InventoryError::Storage(_) | InventoryError::Pool(_) | InventoryError::Io(_)) => {
                Self::Internal(anyhow::Error::new(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflict_is_bad_request() {
        let (status, body) = body_json(InventoryError::store_exists("A").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"message": "store exists"}));
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, body) =
            body_json(InventoryError::StoreNotFound("X".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "store not found");
    }

    #[tokio::test]
    async fn auth_errors_map_to_401_and_403() {
        let (status, body) = body_json(AuthError::Unauthenticated("expired").into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], UNAUTHENTICATED_MESSAGE);

        let forbidden = AuthError::Forbidden {
            username: "alice".into(),
            required: Role::Admin,
            actual: Some(Role::Reader),
        };
        let (status, body) = body_json(forbidden.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], FORBIDDEN_MESSAGE);

        let (status, body) = body_json(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid credentials");
    }

    #[tokio::test]
    async fn internal_body_is_generic() {
        let err = ApiError::Internal(anyhow::anyhow!("disk on fire at /var/lib/x"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"message": INTERNAL_MESSAGE}));
    }

    #[test]
    fn storage_errors_become_internal() {
        let err: ApiError = InventoryError::Storage(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn validation_lists_field_errors() {
        let mut errors = FieldErrors::new();
        errors.insert("ip".into(), vec!["bad".into()]);
        let (status, body) = body_json(ApiError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"message": "Validation errors", "errors": {"ip": ["bad"]}})
        );
    }
}
