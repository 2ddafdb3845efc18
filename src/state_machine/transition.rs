//! Pure state transition function

use super::{AgentContext, AgentState, Effect, Event, ToolCall};
use crate::llm::{ContentBlock, LlmMessage, MessageRole};
use crate::runtime::{ErrorKind, StreamEvent};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: AgentState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: AgentState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Loop already finished")]
    AlreadyTerminal,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs and performs
/// no I/O.
pub fn transition(
    state: &AgentState,
    context: &AgentContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (AgentState::Done | AgentState::Failed { .. }, _) => Err(TransitionError::AlreadyTerminal),

        // ============================================================
        // Reasoning
        // ============================================================
        (AgentState::Reasoning { step }, Event::LlmResponse { content, tool_calls }) => {
            let step = *step;

            if tool_calls.is_empty() {
                let answer = text_of(&content);
                return Ok(TransitionResult::new(AgentState::Done)
                    .with_effect(Effect::AppendMessage(assistant(content)))
                    .with_effect(Effect::Emit(StreamEvent::Final { result: answer })));
            }

            if let Some(unknown) = tool_calls.iter().find(|c| !context.has_tool(&c.name)) {
                return Ok(fail(
                    ErrorKind::UnknownTool,
                    format!("Unknown tool: {}", unknown.name),
                ));
            }

            let mut calls = tool_calls.into_iter();
            let Some(first) = calls.next() else {
                return Err(TransitionError::InvalidTransition(
                    "tool call list emptied unexpectedly".to_string(),
                ));
            };
            Ok(start_tool(
                TransitionResult::new(AgentState::Reasoning { step })
                    .with_effect(Effect::AppendMessage(assistant(content))),
                step,
                first,
                calls.collect(),
            ))
        }

        (AgentState::Reasoning { .. }, Event::LlmError { message }) => {
            Ok(fail(ErrorKind::Model, message))
        }

        // ============================================================
        // Acting / Observing
        // ============================================================
        (
            AgentState::Acting {
                step,
                current,
                queued,
            },
            Event::ToolComplete {
                tool_use_id,
                output,
            },
        ) if tool_use_id == current.id => {
            let step = *step;
            let observation = output.observation();
            let result = TransitionResult::new(AgentState::Reasoning { step })
                .with_effect(Effect::AppendMessage(LlmMessage::tool(
                    &current.id,
                    observation.clone(),
                    !output.success,
                )))
                .with_effect(Effect::Emit(StreamEvent::ToolEnd {
                    output: observation,
                }));

            if let Some((next, rest)) = queued.split_first() {
                return Ok(start_tool(result, step, next.clone(), rest.to_vec()));
            }

            if step >= context.max_steps {
                let failed = fail(
                    ErrorKind::StepLimitExceeded,
                    format!(
                        "Step limit of {} reached without a final answer",
                        context.max_steps
                    ),
                );
                let mut effects = result.effects;
                effects.extend(failed.effects);
                return Ok(TransitionResult {
                    new_state: failed.new_state,
                    effects,
                });
            }

            Ok(TransitionResult {
                new_state: AgentState::Reasoning { step: step + 1 },
                effects: result.effects,
            }
            .with_effect(Effect::RequestLlm))
        }

        (
            AgentState::Acting { current, .. },
            Event::ToolFailed {
                tool_use_id,
                kind,
                message,
            },
        ) if tool_use_id == current.id => Ok(fail(kind, message)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {state:?}"
        ))),
    }
}

fn assistant(content: Vec<ContentBlock>) -> LlmMessage {
    LlmMessage {
        role: MessageRole::Assistant,
        content,
    }
}

fn text_of(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Enter `Acting` for `call`, keeping effects already queued in `result`
fn start_tool(
    result: TransitionResult,
    step: u32,
    call: ToolCall,
    queued: Vec<ToolCall>,
) -> TransitionResult {
    let start = StreamEvent::ToolStart {
        tool: call.name.clone(),
        input: call.input.clone(),
    };
    TransitionResult {
        new_state: AgentState::Acting {
            step,
            current: call.clone(),
            queued,
        },
        effects: result.effects,
    }
    .with_effect(Effect::Emit(start))
    .with_effect(Effect::ExecuteTool(call))
}

fn fail(kind: ErrorKind, message: String) -> TransitionResult {
    TransitionResult::new(AgentState::Failed {
        kind,
        message: message.clone(),
    })
    .with_effect(Effect::Emit(StreamEvent::Error { message, kind }))
}
