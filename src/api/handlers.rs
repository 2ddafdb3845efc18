//! HTTP request handlers

use super::ndjson::{self, ndjson_body};
use super::types::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse, HealthResponse};
use super::AppState;
use crate::llm::LlmMessage;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let screenshots = ServeDir::new(&state.screenshot_dir);

    Router::new()
        .route("/api/chat", post(chat_stream))
        .route("/api/chat/sync", post(chat_sync))
        .route("/health", get(health))
        .nest_service("/screenshots", screenshots.clone())
        // Screenshot paths handed to the model are relative to the root
        .fallback_service(screenshots)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Run the agent, streaming NDJSON records as they are produced
async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let history = parse_history(payload)?;
    tracing::info!(messages = history.len(), "Streaming chat request");

    let (events, guard) = state.runner.start(history).into_parts();
    Ok((
        [(header::CONTENT_TYPE, ndjson::CONTENT_TYPE)],
        ndjson_body(events, guard),
    )
        .into_response())
}

/// Run the agent to completion and return only the answer
async fn chat_sync(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let history = parse_history(payload)?;
    tracing::info!(messages = history.len(), "Chat request");

    let message = state
        .runner
        .start(history)
        .final_answer()
        .await
        .map_err(|failure| {
            tracing::warn!(kind = ?failure.kind, error = %failure.message, "Chat failed");
            AppError::Internal(failure.message)
        })?;
    Ok(Json(ChatResponse { message }))
}

fn parse_history(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Vec<(Option<String>, LlmMessage)>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if request.messages.is_empty() {
        return Err(AppError::BadRequest(
            "At least one message is required".to_string(),
        ));
    }
    request
        .messages
        .into_iter()
        .map(ChatMessage::into_llm)
        .collect::<Result<_, _>>()
        .map_err(AppError::BadRequest)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
