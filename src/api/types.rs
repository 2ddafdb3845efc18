//! API request and response types

use crate::llm::LlmMessage;
use serde::{Deserialize, Serialize};

/// Body of both chat endpoints
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// One prior turn of the conversation
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Map onto a model message; only `user` and `assistant` turns are accepted
    pub fn into_llm(self) -> Result<(Option<String>, LlmMessage), String> {
        let message = match self.role.as_str() {
            "user" => LlmMessage::user(self.content),
            "assistant" => LlmMessage::assistant(self.content),
            other => return Err(format!("Unsupported message role: {other}")),
        };
        Ok((self.id, message))
    }
}

/// Response of the non-streaming endpoint
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
