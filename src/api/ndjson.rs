//! Newline-delimited JSON response bodies

use crate::runtime::{ErrorKind, StreamEvent};
use axum::body::Body;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;

pub const CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";

/// One line per record, in order, ending after the first terminal record.
///
/// A channel that closes without a terminal record gets a synthesized
/// `internal` error so the stream still ends with exactly one.
pub fn ndjson_lines(events: mpsc::Receiver<StreamEvent>) -> impl Stream<Item = String> {
    stream::unfold(Some(ReceiverStream::new(events)), |events| async move {
        let mut events = events?;
        match events.next().await {
            Some(event) => {
                let line = event.to_ndjson_line();
                let rest = if event.is_terminal() {
                    None
                } else {
                    Some(events)
                };
                Some((line, rest))
            }
            None => {
                tracing::warn!("Event channel closed without a terminal record");
                let event = StreamEvent::Error {
                    message: "Agent loop ended unexpectedly".to_string(),
                    kind: ErrorKind::Internal,
                };
                Some((event.to_ndjson_line(), None))
            }
        }
    })
}

/// Response body over `events`; dropping the body (client gone) releases
/// `guard` and with it the loop's cancellation token.
pub fn ndjson_body(events: mpsc::Receiver<StreamEvent>, guard: DropGuard) -> Body {
    let lines = ndjson_lines(events).map(move |line| {
        let _ = &guard;
        Ok::<_, Infallible>(line)
    });
    Body::from_stream(lines)
}
