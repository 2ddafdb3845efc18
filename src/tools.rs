//! Tool registry for the browsing agent
//!
//! Tools are stateless singletons. Everything a call needs (the shared
//! browser session, where screenshots go) arrives through `ToolContext`.

pub mod browser;

pub use browser::{
    BrowserError, BrowserSessionManager, ClickTool, FillTool, NavigateTool, ReadTool,
    ScreenshotStore, ScreenshotTool,
};

use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Result from tool execution, as fed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }

    /// Observation text; failures are prefixed so the model can tell them apart
    pub fn observation(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.output)
        }
    }
}

/// Errors raised while resolving or running a tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    Validation { tool: String, reason: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ToolError {
    pub fn validation(tool: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// Fatal errors end the agent loop; the rest become observations
    pub fn is_fatal(&self) -> bool {
        match self {
            ToolError::UnknownTool(_) => true,
            ToolError::Validation { .. } => false,
            ToolError::Browser(e) => e.is_session_error(),
        }
    }
}

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
}

impl ParamType {
    fn json_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// Name, description and parameter schema of a tool
#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// JSON schema advertised to the model
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.json_name(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Check arguments against the parameter schema
    pub fn validate(&self, input: &Value) -> Result<(), ToolError> {
        let empty = Map::new();
        let args = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::validation(
                    self.name,
                    format!("arguments must be a JSON object, got {other}"),
                ))
            }
        };

        if let Some(unexpected) = args
            .keys()
            .find(|key| !self.params.iter().any(|p| p.name == key.as_str()))
        {
            return Err(ToolError::validation(
                self.name,
                format!("unexpected parameter `{unexpected}`"),
            ));
        }

        for param in self.params {
            match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::validation(
                        self.name,
                        format!("missing required parameter `{}`", param.name),
                    ));
                }
                Some(value) if !value.is_null() && !param.kind.matches(value) => {
                    return Err(ToolError::validation(
                        self.name,
                        format!(
                            "parameter `{}` must be a {}",
                            param.name,
                            param.kind.json_name()
                        ),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and decode arguments into the tool's typed input
    pub fn parse<T: DeserializeOwned>(&self, input: Value) -> Result<T, ToolError> {
        self.validate(&input)?;
        let input = if input.is_null() { json!({}) } else { input };
        serde_json::from_value(input).map_err(|e| ToolError::validation(self.name, e.to_string()))
    }
}

/// All context needed for a tool invocation.
///
/// Cloned for each call; tools derive everything from it.
#[derive(Clone)]
pub struct ToolContext {
    browser_sessions: Arc<BrowserSessionManager>,
    screenshots: Arc<ScreenshotStore>,
}

impl ToolContext {
    pub fn new(
        browser_sessions: Arc<BrowserSessionManager>,
        screenshots: Arc<ScreenshotStore>,
    ) -> Self {
        Self {
            browser_sessions,
            screenshots,
        }
    }

    /// Exclusive use of the shared page, launching the browser on first use
    pub async fn page(&self) -> Result<browser::PageLease, ToolError> {
        Ok(self.browser_sessions.lease().await?)
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static description: name, model-facing text and parameters
    fn spec(&self) -> &'static ToolSpec;

    fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Execute with already-validated arguments, returning the observation text
    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError>;
}

/// Fixed set of tools, looked up by name
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The five browser tools, in the order they are advertised
    pub fn browser() -> Self {
        Self::with_tools(vec![
            Arc::new(NavigateTool),
            Arc::new(ClickTool),
            Arc::new(FillTool),
            Arc::new(ReadTool),
            Arc::new(ScreenshotTool),
        ])
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get all tool definitions for the LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.spec().definition()).collect()
    }

    /// Execute a tool by name.
    ///
    /// Argument and driver failures come back as error observations; only
    /// unknown tools and session failures are returned as `Err`.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::info!(tool = name, input = %input, "Tool call");

        if let Err(e) = tool.spec().validate(&input) {
            tracing::warn!(tool = name, error = %e, "Rejected tool arguments");
            return Ok(ToolOutput::error(e.to_string()));
        }

        let start = std::time::Instant::now();
        match tool.run(input, ctx).await {
            Ok(output) => {
                tracing::info!(
                    tool = name,
                    duration_ms = %start.elapsed().as_millis(),
                    output = %output,
                    "Tool result"
                );
                Ok(ToolOutput::success(output))
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(tool = name, error = %e, "Tool failed fatally");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool failed");
                Ok(ToolOutput::error(e.to_string()))
            }
        }
    }
}
