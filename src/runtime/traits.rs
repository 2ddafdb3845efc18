//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, TokenSender, ToolDefinition};
use crate::tools::{ToolContext, ToolError, ToolOutput, ToolRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a request, forwarding answer text to `tokens` as it arrives
    async fn complete(
        &self,
        request: &LlmRequest,
        tokens: TokenSender,
    ) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Executor for tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run a tool. `Err` only for failures that must end the loop.
    async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError>;

    /// Get tool definitions for LLM
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(
        &self,
        request: &LlmRequest,
        tokens: TokenSender,
    ) -> Result<LlmResponse, LlmError> {
        self.service.complete_streaming(request, tokens).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

/// Adapter to use `ToolRegistry` as `ToolExecutor`, bound to the shared browser
pub struct ToolRegistryExecutor {
    registry: ToolRegistry,
    context: ToolContext,
}

impl ToolRegistryExecutor {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self { registry, context }
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistryExecutor {
    async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        self.registry
            .execute(name, input, self.context.clone())
            .await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }
}
