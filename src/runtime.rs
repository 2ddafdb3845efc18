//! Runtime for executing agent loops
//!
//! One loop per request. The loop runs on its own task and talks to the
//! transport only through a bounded channel of `StreamEvent`s; dropping the
//! `AgentRun` handle cancels it.

mod events;
mod executor;
pub mod traits;
mod transcript;

#[cfg(test)]
pub mod testing;

pub use events::{ErrorKind, EventSink, StreamEvent};
pub use executor::AgentRuntime;
pub use traits::*;
pub use transcript::Transcript;

use crate::config::AgentConfig;
use crate::llm::LlmMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Records buffered between the loop and a slow consumer
const EVENT_BUFFER: usize = 64;

/// Starts agent loops over the shared model client and tool set
#[derive(Clone)]
pub struct AgentRunner {
    llm_client: Arc<dyn LlmClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    config: AgentConfig,
}

impl AgentRunner {
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        tool_executor: Arc<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm_client,
            tool_executor,
            config,
        }
    }

    /// Spawn a loop over `history` (oldest first, optional client ids)
    pub fn start(&self, history: Vec<(Option<String>, LlmMessage)>) -> AgentRun {
        let (sink, events) = EventSink::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let runtime = AgentRuntime::new(
            self.llm_client.clone(),
            self.tool_executor.clone(),
            &self.config,
            Transcript::new(history),
            sink,
            cancel.clone(),
        );
        tokio::spawn(runtime.run());

        AgentRun {
            events,
            guard: cancel.drop_guard(),
        }
    }
}

/// Loop ended in `error` (or vanished without a terminal record)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Consumer side of one running loop
pub struct AgentRun {
    events: mpsc::Receiver<StreamEvent>,
    guard: DropGuard,
}

impl AgentRun {
    /// Event channel plus the guard that cancels the loop when dropped
    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, DropGuard) {
        (self.events, self.guard)
    }

    /// Wait for the terminal record, discarding progress records
    pub async fn final_answer(mut self) -> Result<String, RunFailure> {
        while let Some(event) = self.events.recv().await {
            match event {
                StreamEvent::Final { result } => return Ok(result),
                StreamEvent::Error { message, kind } => return Err(RunFailure { kind, message }),
                _ => {}
            }
        }
        Err(RunFailure {
            kind: ErrorKind::Internal,
            message: "Agent loop ended without a result".to_string(),
        })
    }
}
