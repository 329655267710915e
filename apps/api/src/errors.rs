use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::provisioning::validation::FieldErrors;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Provider and database detail is logged here and never returned to the caller;
/// the response only names the step that failed.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Agent creation error: {0}")]
    AgentCreation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(fields) => {
                let body = Json(json!({
                    "error": {
                        "code": "VALIDATION_ERROR",
                        "message": "Some fields need attention",
                        "fields": fields,
                    }
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::IdentityUnavailable(msg) => {
                tracing::warn!("Identity provider unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "IDENTITY_UNAVAILABLE",
                    "Sign-in service is unavailable; try again shortly".to_string(),
                )
            }
            AppError::Extraction(msg) => {
                tracing::warn!("Extraction error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "EXTRACTION_FAILED",
                    "Failed to read the document; paste your resume text instead".to_string(),
                )
            }
            AppError::AgentCreation(msg) => {
                tracing::error!("Agent creation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "AGENT_CREATION_FAILED",
                    "Failed to create agent".to_string(),
                )
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_FAILED",
                    "Failed to update profile".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_carries_field_map() {
        let mut fields = FieldErrors::default();
        fields.insert("first_name", "Must be at least 2 characters");
        let resp = AppError::Validation(fields).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(
            json["error"]["fields"]["first_name"],
            "Must be at least 2 characters"
        );
    }

    #[tokio::test]
    async fn test_agent_error_hides_provider_text() {
        let resp =
            AppError::AgentCreation("provider said: invalid xi-api-key sk_live_123".into())
                .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["message"], "Failed to create agent");
        assert!(!json.to_string().contains("sk_live_123"));
    }

    #[tokio::test]
    async fn test_identity_outage_is_not_unauthorized() {
        let resp = AppError::IdentityUnavailable("connection refused".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "IDENTITY_UNAVAILABLE");
        assert!(!json.to_string().contains("connection refused"));
    }

    #[test]
    fn test_validation_display_names_fields() {
        let mut fields = FieldErrors::default();
        fields.insert("first_name", "Must be at least 2 characters");
        fields.insert("credential", "An agent provider API key is required");
        assert_eq!(
            AppError::Validation(fields).to_string(),
            "Validation failed: credential, first_name"
        );
    }

    #[tokio::test]
    async fn test_persistence_error_message() {
        let resp = AppError::Persistence("duplicate key".into()).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"]["message"], "Failed to update profile");
    }
}
