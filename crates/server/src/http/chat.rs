//! `POST /api/chat`

use super::error::ApiError;
use super::AppState;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
}

/// Stream an answer as `text/plain`, or return a JSON error.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected chat body: {}", rejection.body_text());
        ApiError::bad_request("Request body must be JSON like {\"question\": \"...\"}.")
    })?;

    let question = request.question.unwrap_or_default();
    let answer = state.pipeline.answer(&question).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(answer))
        .map_err(|e| ApiError::from(unilink_core::AppError::Other(e.to_string())))
}
