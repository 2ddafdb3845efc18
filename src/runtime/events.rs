//! Records streamed to the client while a loop runs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a loop failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Model call failed or timed out
    Model,
    /// Browser or page could not be created
    Session,
    /// Model asked for a tool that does not exist
    UnknownTool,
    /// Reasoning step cap reached without a final answer
    StepLimitExceeded,
    /// Bug or broken invariant inside the loop
    Internal,
}

/// One record of the response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    Token { value: String },
    ToolStart { tool: String, input: Value },
    ToolEnd { output: String },
    Final { result: String },
    Error { message: String, kind: ErrorKind },
}

impl StreamEvent {
    /// `final` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Final { .. } | StreamEvent::Error { .. })
    }

    /// One NDJSON line, newline included
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"unserializable event: {e}","kind":"internal"}}"#
            )
        });
        line.push('\n');
        line
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Stream already closed")]
    Closed,
    #[error("Client disconnected")]
    Disconnected,
}

/// Sending side of a response stream.
///
/// Closes itself after the first terminal event; anything sent after that
/// is refused instead of delivered. A full channel applies backpressure.
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    pub async fn send(&mut self, event: StreamEvent) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        let terminal = event.is_terminal();
        let sent = tx.send(event).await;
        if terminal || sent.is_err() {
            self.tx = None;
        }
        sent.map_err(|_| SinkError::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, mpsc::Sender::is_closed)
    }
}
