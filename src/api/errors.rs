use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::ai_grading::AiError;
use crate::tasks::grading::GradingError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        let detail = err.to_string();
        match err {
            GradingError::SubmissionNotFound(_) | GradingError::AssignmentNotFound(_) => {
                Self::NotFound(detail)
            }
            GradingError::AlreadyGraded(_) | GradingError::NotGradable { .. } => {
                Self::Conflict(detail)
            }
            GradingError::ContentExtraction(_) => Self::UnprocessableEntity(detail),
            GradingError::Ai(AiError::EmptyInput) => Self::BadRequest(detail),
            GradingError::Ai(ref ai) if ai.is_retryable() => {
                tracing::warn!(error = %ai, "AI provider unavailable after retries");
                Self::ServiceUnavailable("AI provider is temporarily unavailable".to_string())
            }
            GradingError::Ai(ai) => {
                tracing::error!(error = %ai, "AI provider rejected grading request");
                Self::BadGateway("AI provider rejected the grading request".to_string())
            }
            GradingError::Store(store) => Self::internal(store, "Failed to persist grading result"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::ServiceUnavailable(message) | ApiError::Internal(message) => {
                tracing::error!(status = status.as_u16(), error = %message, "Request failed");
                message
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::UnprocessableEntity(message)
            | ApiError::BadGateway(message) => message,
        };
        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
