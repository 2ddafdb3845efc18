//! LLM provider abstraction
//!
//! Provides a common interface for the reasoning model. The only concrete
//! provider is an `OpenAI`-compatible chat completions endpoint.

mod error;
mod openai;
mod stream;
mod types;

pub use error::LlmError;
pub use openai::{LlmConfig, OpenAIService, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half used by providers to hand out incremental answer tokens
pub type TokenSender = mpsc::UnboundedSender<String>;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request and wait for the whole response
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Make a completion request, forwarding text deltas as they arrive.
    ///
    /// Providers without incremental delivery fall back to `complete` and
    /// forward the whole step text as a single token.
    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        tokens: TokenSender,
    ) -> Result<LlmResponse, LlmError> {
        complete_as_one_token(self, request, tokens).await
    }

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// `complete`, then forward the whole step text as a single token
async fn complete_as_one_token<S>(
    service: &S,
    request: &LlmRequest,
    tokens: TokenSender,
) -> Result<LlmResponse, LlmError>
where
    S: LlmService + ?Sized,
{
    let response = service.complete(request).await?;
    let text = response.text();
    if !text.is_empty() {
        let _ = tokens.send(text);
    }
    Ok(response)
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }

    fn log_result(&self, result: &Result<LlmResponse, LlmError>, duration: std::time::Duration) {
        match result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_uses().len(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        self.log_result(&result, start.elapsed());
        result
    }

    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        tokens: TokenSender,
    ) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete_streaming(request, tokens).await;
        self.log_result(&result, start.elapsed());
        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
