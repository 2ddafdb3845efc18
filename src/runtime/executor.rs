//! Agent loop executor

use super::events::{ErrorKind, EventSink, StreamEvent};
use super::traits::{LlmClient, ToolExecutor};
use super::transcript::Transcript;
use crate::config::AgentConfig;
use crate::llm::{LlmError, LlmRequest};
use crate::state_machine::{transition, AgentContext, AgentState, Effect, Event, ToolCall};
use crate::system_prompt::build_system_prompt;
use crate::tools::ToolError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The request is gone (cancelled or disconnected); stop without emitting
#[derive(Debug)]
struct Stopped;

/// Runs one agent loop to completion, streaming records into an `EventSink`
pub struct AgentRuntime<L: ?Sized, T: ?Sized> {
    context: AgentContext,
    llm_timeout: Duration,
    state: AgentState,
    transcript: Transcript,
    llm_client: Arc<L>,
    tool_executor: Arc<T>,
    sink: EventSink,
    cancel: CancellationToken,
}

impl<L, T> AgentRuntime<L, T>
where
    L: LlmClient + ?Sized,
    T: ToolExecutor + ?Sized,
{
    pub fn new(
        llm_client: Arc<L>,
        tool_executor: Arc<T>,
        config: &AgentConfig,
        transcript: Transcript,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let tool_names = tool_executor.definitions().into_iter().map(|d| d.name);
        Self {
            context: AgentContext::new(config.max_steps, tool_names),
            llm_timeout: config.llm_timeout,
            state: AgentState::initial(),
            transcript,
            llm_client,
            tool_executor,
            sink,
            cancel,
        }
    }

    pub async fn run(mut self) {
        let start = Instant::now();
        tracing::info!(
            model = %self.llm_client.model_id(),
            messages = self.transcript.message_count(),
            "Starting agent loop"
        );

        let mut pending = VecDeque::from([Effect::RequestLlm]);
        while let Some(effect) = pending.pop_front() {
            let event = match self.execute_effect(effect).await {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(Stopped) => {
                    tracing::info!(
                        duration_ms = %start.elapsed().as_millis(),
                        "Request cancelled, agent loop stopped"
                    );
                    return;
                }
            };

            match transition(&self.state, &self.context, event) {
                Ok(result) => {
                    self.state = result.new_state;
                    pending.extend(result.effects);
                }
                Err(e) => {
                    tracing::error!(error = %e, state = ?self.state, "Invalid transition");
                    let message = e.to_string();
                    self.state = AgentState::Failed {
                        kind: ErrorKind::Internal,
                        message: message.clone(),
                    };
                    let _ = self
                        .sink
                        .send(StreamEvent::Error {
                            message,
                            kind: ErrorKind::Internal,
                        })
                        .await;
                    return;
                }
            }
        }

        match &self.state {
            AgentState::Failed { kind, message } => tracing::warn!(
                kind = ?kind,
                error = %message,
                duration_ms = %start.elapsed().as_millis(),
                "Agent loop failed"
            ),
            state => tracing::info!(
                state = ?state,
                duration_ms = %start.elapsed().as_millis(),
                "Agent loop finished"
            ),
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, Stopped> {
        match effect {
            Effect::AppendMessage(message) => {
                self.transcript.push(message);
                Ok(None)
            }
            Effect::Emit(event) => {
                self.emit(event).await?;
                Ok(None)
            }
            Effect::RequestLlm => self.request_llm().await.map(Some),
            Effect::ExecuteTool(call) => self.execute_tool(call).await.map(Some),
        }
    }

    async fn emit(&mut self, event: StreamEvent) -> Result<(), Stopped> {
        self.sink.send(event).await.map_err(|e| {
            tracing::info!(error = %e, "Stream no longer accepts events");
            Stopped
        })
    }

    fn ensure_live(&self) -> Result<(), Stopped> {
        if self.cancel.is_cancelled() || self.sink.is_closed() {
            return Err(Stopped);
        }
        Ok(())
    }

    async fn request_llm(&mut self) -> Result<Event, Stopped> {
        self.ensure_live()?;
        if let AgentState::Reasoning { step } = &self.state {
            tracing::debug!(step, "Requesting next step from model");
        }

        let tools = self.tool_executor.definitions();
        let request = LlmRequest {
            system: vec![build_system_prompt(&tools)],
            messages: self.transcript.messages(),
            tools,
            max_tokens: None,
        };

        let (tokens_tx, mut tokens_rx) = mpsc::unbounded_channel();
        let llm = self.llm_client.clone();
        let completion = async move { llm.complete(&request, tokens_tx).await };
        tokio::pin!(completion);

        // Only time spent in the provider counts; waiting on the consumer does not
        let timeout = self.llm_timeout;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let cancel = self.cancel.clone();
        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Cancelled while waiting for the model");
                    return Err(Stopped);
                }
                Some(token) = tokens_rx.recv() => {
                    let paused = tokio::time::Instant::now();
                    self.emit(StreamEvent::Token { value: token }).await?;
                    let resumed = deadline.deadline() + paused.elapsed();
                    deadline.as_mut().reset(resumed);
                }
                result = &mut completion => break result,
                () = &mut deadline => break Err(LlmError::timeout(timeout)),
            }
        };
        // Deltas sent just before the completion resolved
        while let Ok(token) = tokens_rx.try_recv() {
            self.emit(StreamEvent::Token { value: token }).await?;
        }

        Ok(match result {
            Ok(response) => {
                let tool_calls = response
                    .tool_uses()
                    .into_iter()
                    .map(|(id, name, input)| ToolCall::new(id, name, input.clone()))
                    .collect();
                Event::LlmResponse {
                    content: response.content,
                    tool_calls,
                }
            }
            Err(e) => {
                tracing::warn!(kind = ?e.kind, error = %e, "Model call failed");
                Event::LlmError {
                    message: e.to_string(),
                }
            }
        })
    }

    /// Tools are never interrupted; once started they finish, and the result
    /// is dropped if the request went away meanwhile.
    async fn execute_tool(&mut self, call: ToolCall) -> Result<Event, Stopped> {
        self.ensure_live()?;

        let result = self
            .tool_executor
            .execute(&call.name, call.input.clone())
            .await;

        if self.ensure_live().is_err() {
            tracing::info!(tool = %call.name, "Request gone, discarding tool result");
            return Err(Stopped);
        }

        Ok(match result {
            Ok(output) => Event::ToolComplete {
                tool_use_id: call.id,
                output,
            },
            Err(e) => Event::ToolFailed {
                tool_use_id: call.id,
                kind: failure_kind(&e),
                message: e.to_string(),
            },
        })
    }
}

fn failure_kind(error: &ToolError) -> ErrorKind {
    match error {
        ToolError::UnknownTool(_) => ErrorKind::UnknownTool,
        ToolError::Browser(e) if e.is_session_error() => ErrorKind::Session,
        _ => ErrorKind::Internal,
    }
}
