//! Effects produced by state transitions

use crate::llm::LlmMessage;
use crate::runtime::StreamEvent;
use crate::state_machine::state::ToolCall;

/// Work for the runtime, performed in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Add a message to the conversation transcript
    AppendMessage(LlmMessage),

    /// Ask the model for the next step
    RequestLlm,

    /// Run a tool; its outcome comes back as an event
    ExecuteTool(ToolCall),

    /// Send a record to the client
    Emit(StreamEvent),
}
