//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use unilink_core::AppError;

const CHAT_FAILED: &str = "Failed to get an answer from the chatbot.";

/// An error rendered as `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if err.is_client_error() {
            tracing::debug!("Rejected chat request: {}", err);
            return match err {
                AppError::Validation(message) => Self::bad_request(message),
                other => Self::bad_request(other.to_string()),
            };
        }

        // Details stay in the log
        tracing::error!("Chat request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: CHAT_FAILED.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let err = ApiError::from(AppError::Validation("Question is required.".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Question is required.");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(AppError::Llm("invalid api key sk-123".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, CHAT_FAILED);
    }
}
