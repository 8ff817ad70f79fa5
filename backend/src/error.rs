use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ai::AiError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("{message}: {source}")]
    Ai {
        message: String,
        #[source]
        source: AiError,
    },

    #[error("Email error: {0}")]
    Email(String),
}

impl AppError {
    pub fn ai(message: impl Into<String>, source: AiError) -> Self {
        AppError::Ai {
            message: message.into(),
            source,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string(), None)
            }
            AppError::Config(ref e) => {
                tracing::error!("Configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured".to_string(), None)
            }
            AppError::Auth(message) => (StatusCode::UNAUTHORIZED, message, None),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message, None),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
            AppError::Ai { message, source } => {
                tracing::error!(provider = %source.provider, status = source.status, "AI error: {}", source.details);
                let status = StatusCode::from_u16(source.status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, message, Some(source.details))
            }
            AppError::Email(details) => {
                tracing::error!("Email error: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to evaluate/send alert email".to_string(),
                    Some(details),
                )
            }
        };

        let mut body = json!({ "message": message });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ai_error_keeps_provider_status_and_details() {
        let err = AppError::ai(
            "Prediction failed",
            AiError::new(429, "groq", "Groq request failed.", "Rate limit reached", true),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Prediction failed");
        assert_eq!(body["details"], "Rate limit reached");
    }

    #[tokio::test]
    async fn client_errors_omit_details() {
        let response = AppError::Conflict("Email already registered".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Email already registered");
        assert!(body.get("details").is_none());
    }
}
