use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of the external text-generation call itself.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generator rate limited the request")]
    RateLimited,

    #[error("generator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error while calling generator: {0}")]
    Network(String),

    #[error("generator response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("no text generator is configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("test generation failed: {0}")]
    UpstreamGeneration(#[from] GenerationError),

    #[error(
        "could not generate any acceptable question out of {requested} requested; \
         try a different topic or difficulty tier"
    )]
    InsufficientQuestions { requested: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EngineError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        EngineError::Forbidden(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::UpstreamGeneration(_) => StatusCode::BAD_GATEWAY,
            EngineError::InsufficientQuestions { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}

/// HTTP rendering of an engine error. Upstream causes are only echoed back
/// outside production.
pub struct ApiError {
    error: EngineError,
    expose_causes: bool,
}

impl ApiError {
    pub fn new(error: EngineError, expose_causes: bool) -> Self {
        Self {
            error,
            expose_causes,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self::new(error, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = match &self.error {
            EngineError::UpstreamGeneration(cause) => {
                tracing::error!("Text generation failed: {}", cause);
                let mut body = json!({
                    "message": "Test generation is temporarily unavailable, please try again later",
                    "status": status.as_u16(),
                });
                if self.expose_causes {
                    body["cause"] = json!(cause.to_string());
                }
                body
            }
            EngineError::Storage(cause) => {
                tracing::error!("Storage failure: {:#}", cause);
                json!({
                    "message": "Internal Server Error",
                    "status": status.as_u16(),
                })
            }
            other => json!({
                "message": other.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            EngineError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::not_found("missing").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::InsufficientQuestions { requested: 10 }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            EngineError::from(GenerationError::RateLimited).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn insufficient_questions_suggests_new_parameters() {
        let message = EngineError::InsufficientQuestions { requested: 30 }.to_string();
        assert!(message.contains("30"));
        assert!(message.contains("different topic or difficulty"));
    }
}
