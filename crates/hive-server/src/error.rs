use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hive_shared::games::GameRuleError;
use hive_shared::{TokenError, ValidationError};
use hive_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("record not found".into()),
            StoreError::NotParticipant => ServerError::Forbidden(e.to_string()),
            StoreError::InvalidTransition { .. } | StoreError::Conflict(_) | StoreError::GameEnded => {
                ServerError::Conflict(e.to_string())
            }
            StoreError::Rules(GameRuleError::InvalidChoice(choice)) => {
                ServerError::Validation(ValidationError::InvalidValue {
                    field: "choice",
                    value: choice,
                })
            }
            StoreError::Rules(GameRuleError::CorruptState(detail)) => ServerError::Internal(detail),
            StoreError::Rules(rule) => ServerError::Conflict(rule.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(e: TokenError) -> Self {
        ServerError::Unauthorized(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
