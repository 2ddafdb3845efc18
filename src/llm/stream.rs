//! Incremental decoding of `OpenAI`-style streamed chat completions
//!
//! Each server-sent event carries one JSON chunk, and `[DONE]` ends the
//! stream. Chunks carry text deltas and fragments of tool calls keyed by
//! index; fragments are concatenated until the stream ends.

use super::types::{ContentBlock, LlmResponse, Usage};
use super::LlmError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// What a single payload contributed to the stream
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamStep {
    /// A chunk was applied; carries the text delta, if any
    Chunk(Option<String>),
    /// The `[DONE]` sentinel
    Done,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds streamed chunks into a single `LlmResponse`
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator {
    text: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Usage,
}

impl StreamAccumulator {
    pub(crate) fn push_payload(&mut self, payload: &str) -> Result<StreamStep, LlmError> {
        if payload == "[DONE]" {
            return Ok(StreamStep::Done);
        }
        let chunk: ChatChunk = serde_json::from_str(payload).map_err(|e| {
            LlmError::unknown(format!("Malformed stream chunk: {e} - payload: {payload}"))
        })?;
        if let Some(error) = chunk.error {
            return Err(LlmError::server_error(format!("Stream error: {}", error.message)));
        }
        Ok(StreamStep::Chunk(self.apply(chunk)))
    }

    fn apply(&mut self, chunk: ChatChunk) -> Option<String> {
        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input_tokens: u64::from(usage.prompt_tokens),
                output_tokens: u64::from(usage.completion_tokens),
            };
        }

        let mut delta_text = None;
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else {
                continue;
            };
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                self.text.push_str(&content);
                delta_text = Some(content);
            }
            for fragment in delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    entry.id = Some(id);
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
        }
        delta_text
    }

    pub(crate) fn finish(self) -> LlmResponse {
        tracing::debug!(
            finish_reason = ?self.finish_reason,
            tool_calls = self.tool_calls.len(),
            "Stream finished"
        );
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::Text { text: self.text });
        }

        for (index, call) in self.tool_calls {
            if call.name.is_empty() {
                continue;
            }
            let input = if call.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, arguments = %call.arguments, "Failed to parse streamed tool arguments");
                    serde_json::json!({})
                })
            };
            content.push(ContentBlock::ToolUse {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.name,
                input,
            });
        }

        LlmResponse {
            content,
            usage: self.usage,
        }
    }

    #[cfg(test)]
    fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}
