//! Agent loop state types

use crate::runtime::ErrorKind;
use serde_json::Value;
use std::collections::HashSet;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Where the loop is.
///
/// Observing has no state of its own: the observation is recorded while
/// leaving `Acting`, on the way back to `Reasoning`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentState {
    /// Waiting on the model; `step` counts model calls, starting at 1
    Reasoning { step: u32 },

    /// Running `current`; `queued` are the other calls from the same response
    Acting {
        step: u32,
        current: ToolCall,
        queued: Vec<ToolCall>,
    },

    /// Final answer emitted
    Done,

    /// Error emitted
    Failed { kind: ErrorKind, message: String },
}

impl AgentState {
    pub fn initial() -> Self {
        AgentState::Reasoning { step: 1 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Done | AgentState::Failed { .. })
    }
}

/// Fixed inputs to every transition of one loop
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub max_steps: u32,
    tool_names: HashSet<String>,
}

impl AgentContext {
    pub fn new(max_steps: u32, tool_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            max_steps,
            tool_names: tool_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tool_names.contains(name)
    }
}
