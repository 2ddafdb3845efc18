//! Events that drive the agent loop

use crate::llm::ContentBlock;
use crate::runtime::ErrorKind;
use crate::state_machine::state::ToolCall;
use crate::tools::ToolOutput;

#[derive(Debug, Clone)]
pub enum Event {
    /// The model answered
    LlmResponse {
        content: Vec<ContentBlock>,
        /// Tool calls extracted from the content
        tool_calls: Vec<ToolCall>,
    },
    /// The model call failed or timed out
    LlmError { message: String },

    /// A tool produced an observation, successful or not
    ToolComplete {
        tool_use_id: String,
        output: ToolOutput,
    },
    /// A tool failed in a way the model cannot recover from
    ToolFailed {
        tool_use_id: String,
        kind: ErrorKind,
        message: String,
    },
}
