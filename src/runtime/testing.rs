//! Mock implementations for testing
//!
//! These mocks enable integration testing of the agent loop without network
//! access or a browser.

use super::traits::*;
use crate::llm::{
    ContentBlock, LlmError, LlmRequest, LlmResponse, TokenSender, ToolDefinition, Usage,
};
use crate::tools::{BrowserError, ToolError, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses.
///
/// Answer text is forwarded as a single token, like a provider without
/// incremental delivery, unless `with_streamed_tokens` is set.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    delay: Option<Duration>,
    token_gap: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: None,
            token_gap: None,
            requests: Mutex::new(Vec::new()),
            request_started: Arc::new(Notify::new()),
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Forward answer text word by word, pausing `gap` between words
    pub fn with_streamed_tokens(mut self, gap: Duration) -> Self {
        self.token_gap = Some(gap);
        self
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        request: &LlmRequest,
        tokens: TokenSender,
    ) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))?;
        let text = response.text();
        match self.token_gap {
            Some(gap) => {
                for (i, word) in text.split_inclusive(' ').enumerate() {
                    if i > 0 {
                        tokio::time::sleep(gap).await;
                    }
                    let _ = tokens.send(word.to_string());
                }
            }
            None if !text.is_empty() => {
                let _ = tokens.send(text);
            }
            None => {}
        }
        Ok(response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::text(text)],
        usage: Usage::default(),
    }
}

/// Response asking for `(id, tool, input)` calls in order
pub fn tool_response(calls: &[(&str, &str, Value)]) -> LlmResponse {
    LlmResponse {
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
            .collect(),
        usage: Usage::default(),
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

enum MockOutcome {
    Output(ToolOutput),
    SessionFailure(String),
}

/// Mock tool executor with predefined outcomes
pub struct MockToolExecutor {
    outcomes: HashMap<String, MockOutcome>,
    definitions: Vec<ToolDefinition>,
    delay: Option<Duration>,
    executions: Mutex<Vec<(String, Value)>>,
    completed: AtomicUsize,
    /// Notified when an execution starts
    pub execution_started: Arc<Notify>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            definitions: Vec::new(),
            delay: None,
            executions: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            execution_started: Arc::new(Notify::new()),
        }
    }

    fn define(&mut self, name: &str, outcome: MockOutcome) {
        self.definitions.push(ToolDefinition {
            name: name.to_string(),
            description: format!("Mock {name}"),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        });
        self.outcomes.insert(name.to_string(), outcome);
    }

    pub fn with_tool(mut self, name: &str, output: ToolOutput) -> Self {
        self.define(name, MockOutcome::Output(output));
        self
    }

    /// Tool whose every call fails to get a browser page
    pub fn with_session_failure(mut self, name: &str, message: &str) -> Self {
        self.define(name, MockOutcome::SessionFailure(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }

    /// Executions that ran to the end
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), input));
        self.execution_started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match self.outcomes.get(name) {
            Some(MockOutcome::Output(output)) => Ok(output.clone()),
            Some(MockOutcome::SessionFailure(message)) => {
                Err(BrowserError::LaunchFailed(message.clone()).into())
            }
            None => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::llm::{LlmMessage, MessageRole};
    use tokio_util::sync::CancellationToken;
    use crate::runtime::{
        AgentRun, AgentRunner, AgentRuntime, ErrorKind, EventSink, RunFailure, StreamEvent,
        Transcript,
    };
    use crate::tools::browser::testing::MockDriver;
    use crate::tools::{BrowserSessionManager, ScreenshotStore, ToolContext, ToolRegistry};
    use serde_json::json;

    fn config(max_steps: u32) -> AgentConfig {
        AgentConfig {
            max_steps,
            llm_timeout: Duration::from_secs(5),
        }
    }

    fn runner(
        llm: Arc<MockLlmClient>,
        tools: Arc<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> AgentRunner {
        AgentRunner::new(llm, tools, config)
    }

    /// Real registry over an in-memory browser
    fn browser_tools(
        driver: MockDriver,
        screenshots: &tempfile::TempDir,
    ) -> Arc<dyn ToolExecutor> {
        let context = ToolContext::new(
            Arc::new(BrowserSessionManager::new(Arc::new(driver))),
            Arc::new(ScreenshotStore::new(screenshots.path(), "/")),
        );
        Arc::new(ToolRegistryExecutor::new(ToolRegistry::browser(), context))
    }

    fn ask(text: &str) -> Vec<(Option<String>, LlmMessage)> {
        vec![(None, LlmMessage::user(text))]
    }

    /// Drain a run until the loop closes the channel
    async fn collect(run: AgentRun) -> Vec<StreamEvent> {
        let (mut events, _guard) = run.into_parts();
        let mut collected = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Some(event)) => collected.push(event),
                Ok(None) => return collected,
                Err(_) => panic!("stream did not close, got {collected:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_navigate_then_final_answer() {
        let screenshots = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[(
            "call_1",
            "navigate",
            json!({"url": "https://example.com"}),
        )]));
        llm.queue_response(text_response("The page title is Example Domain."));

        let tools = browser_tools(MockDriver::new(), &screenshots);
        let run = runner(llm.clone(), tools, config(10)).start(ask("Open example.com"));
        let events = collect(run).await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ToolStart {
                    tool: "navigate".into(),
                    input: json!({"url": "https://example.com"}),
                },
                StreamEvent::ToolEnd {
                    output: "Navigated to https://example.com".into(),
                },
                StreamEvent::Token {
                    value: "The page title is Example Domain.".into(),
                },
                StreamEvent::Final {
                    result: "The page title is Example Domain.".into(),
                },
            ]
        );

        // Second step sees the observation
        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        let history = &requests[1].messages;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(
            history[2],
            LlmMessage::tool("call_1", "Navigated to https://example.com", false)
        );
    }

    fn tokens(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { value } => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_streamed_tokens_arrive_in_order_before_step_records() {
        let llm = Arc::new(
            MockLlmClient::new("test-model").with_streamed_tokens(Duration::from_millis(5)),
        );
        llm.queue_response(LlmResponse {
            content: vec![
                ContentBlock::text("Opening the page now."),
                ContentBlock::tool_use("call_1", "navigate", json!({"url": "https://a.test"})),
            ],
            usage: Usage::default(),
        });
        llm.queue_response(text_response("The heading is Welcome."));

        let tools = Arc::new(
            MockToolExecutor::new().with_tool("navigate", ToolOutput::success("Navigated")),
        );
        let events = collect(runner(llm, tools, config(10)).start(ask("open a.test"))).await;

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Token { .. } => "token",
                StreamEvent::ToolStart { .. } => "tool-start",
                StreamEvent::ToolEnd { .. } => "tool-end",
                StreamEvent::Final { .. } => "final",
                StreamEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "token", "token", "token", "token", "tool-start", "tool-end", "token", "token",
                "token", "token", "final",
            ]
        );
        assert_eq!(
            tokens(&events),
            ["Opening ", "the ", "page ", "now.", "The ", "heading ", "is ", "Welcome."]
        );
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Final {
                result: "The heading is Welcome.".into()
            })
        );
    }

    #[tokio::test]
    async fn test_slow_consumer_does_not_time_out_model() {
        let llm = Arc::new(
            MockLlmClient::new("test-model").with_streamed_tokens(Duration::from_millis(5)),
        );
        llm.queue_response(text_response("one two three four"));
        let config = AgentConfig {
            max_steps: 10,
            llm_timeout: Duration::from_millis(150),
        };

        // One slot: every token waits for the reader
        let (sink, mut events) = EventSink::channel(1);
        let runtime = AgentRuntime::new(
            llm,
            Arc::new(MockToolExecutor::new()),
            &config,
            Transcript::new(ask("count")),
            sink,
            CancellationToken::new(),
        );
        tokio::spawn(runtime.run());

        let mut received = Vec::new();
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            match events.recv().await {
                Some(event) => received.push(event),
                None => break,
            }
        }

        assert_eq!(tokens(&received), ["one ", "two ", "three ", "four"]);
        assert_eq!(
            received.last(),
            Some(&StreamEvent::Final {
                result: "one two three four".into()
            })
        );
    }

    #[tokio::test]
    async fn test_request_carries_tools_and_system_prompt() {
        let screenshots = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(text_response("Hello"));

        let history = vec![
            (Some("m1".to_string()), LlmMessage::user("hi")),
            (Some("m2".to_string()), LlmMessage::assistant("hello")),
            (Some("m3".to_string()), LlmMessage::user("what can you do?")),
        ];
        let tools = browser_tools(MockDriver::new(), &screenshots);
        collect(runner(llm.clone(), tools, config(10)).start(history)).await;

        let request = &llm.recorded_requests()[0];
        assert_eq!(request.messages.len(), 3);
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["navigate", "click", "fill", "read", "screenshot"]);
        assert!(request.system[0].text.contains("navigate"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[("call_1", "teleport", json!({}))]));
        llm.queue_response(text_response("should never be requested"));

        let tools =
            Arc::new(MockToolExecutor::new().with_tool("navigate", ToolOutput::success("ok")));
        let events = collect(runner(llm.clone(), tools.clone(), config(10)).start(ask("go"))).await;

        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "Unknown tool: teleport".into(),
                kind: ErrorKind::UnknownTool,
            }]
        );
        assert!(tools.recorded_executions().is_empty());
        assert_eq!(llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_click_miss_is_observation() {
        let screenshots = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[("call_1", "click", json!({"selector": "#missing"}))]));
        llm.queue_response(text_response("There is no such button."));

        let tools = browser_tools(MockDriver::new(), &screenshots);
        let events = collect(runner(llm.clone(), tools, config(10)).start(ask("click it"))).await;

        let StreamEvent::ToolEnd { output } = &events[1] else {
            panic!("expected tool-end, got {events:?}");
        };
        assert!(output.starts_with("Error: Element not found"), "{output}");
        assert!(matches!(events.last(), Some(StreamEvent::Final { .. })));

        let observation = &llm.recorded_requests()[1].messages[2];
        assert_eq!(observation.role, MessageRole::Tool);
        assert!(matches!(
            &observation.content[0],
            ContentBlock::ToolResult { is_error: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_multiple_calls_run_in_order() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[
            ("call_1", "fill", json!({"selector": "#q", "value": "rust"})),
            ("call_2", "click", json!({"selector": "#go"})),
        ]));
        llm.queue_response(text_response("Searched."));

        let tools = Arc::new(
            MockToolExecutor::new()
                .with_tool("fill", ToolOutput::success("Filled #q with rust"))
                .with_tool("click", ToolOutput::success("Clicked on #go")),
        );
        let run = runner(llm.clone(), tools.clone(), config(10)).start(ask("search"));
        let events = collect(run).await;

        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                StreamEvent::ToolStart { tool, .. } => format!("start {tool}"),
                StreamEvent::ToolEnd { output } => format!("end {output}"),
                StreamEvent::Token { .. } => "token".to_string(),
                StreamEvent::Final { .. } => "final".to_string(),
                StreamEvent::Error { .. } => "error".to_string(),
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "start fill",
                "end Filled #q with rust",
                "start click",
                "end Clicked on #go",
                "token",
                "final"
            ]
        );
        let executed: Vec<_> = tools.recorded_executions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(executed, ["fill", "click"]);
        assert_eq!(llm.recorded_requests()[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        for i in 0..5 {
            let id = format!("call_{i}");
            llm.queue_response(tool_response(&[(&id, "read", json!({"selector": "body"}))]));
        }

        let tools =
            Arc::new(MockToolExecutor::new().with_tool("read", ToolOutput::success("text")));
        let events = collect(runner(llm.clone(), tools, config(2)).start(ask("loop"))).await;

        assert_eq!(llm.recorded_requests().len(), 2);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Error {
                message: "Step limit of 2 reached without a final answer".into(),
                kind: ErrorKind::StepLimitExceeded,
            })
        );
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Final { .. })));
    }

    #[tokio::test]
    async fn test_llm_error_is_fatal() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_error(LlmError::auth("Invalid API key"));

        let events = collect(
            runner(llm, Arc::new(MockToolExecutor::new()), config(10)).start(ask("hi")),
        )
        .await;

        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "Invalid API key".into(),
                kind: ErrorKind::Model,
            }]
        );
    }

    #[tokio::test]
    async fn test_llm_timeout() {
        let llm = Arc::new(MockLlmClient::new("test-model").with_delay(Duration::from_secs(30)));
        llm.queue_response(text_response("too late"));

        let config = AgentConfig {
            max_steps: 10,
            llm_timeout: Duration::from_millis(50),
        };
        let run = runner(llm, Arc::new(MockToolExecutor::new()), config).start(ask("hi"));
        let events = collect(run).await;

        assert_eq!(events.len(), 1);
        let StreamEvent::Error { message, kind } = &events[0] else {
            panic!("expected error, got {events:?}");
        };
        assert_eq!(*kind, ErrorKind::Model);
        assert!(message.contains("did not respond"), "{message}");
    }

    #[tokio::test]
    async fn test_launch_failure_is_session_error() {
        let screenshots = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[(
            "call_1",
            "navigate",
            json!({"url": "https://example.com"}),
        )]));

        let tools = browser_tools(MockDriver::failing_launch(), &screenshots);
        let events = collect(runner(llm, tools, config(10)).start(ask("go"))).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::ToolStart { .. }));
        assert!(matches!(
            events[1],
            StreamEvent::Error {
                kind: ErrorKind::Session,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_session_failure_from_executor() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[("call_1", "read", json!({"selector": "h1"}))]));

        let tools = Arc::new(MockToolExecutor::new().with_session_failure("read", "no chrome"));
        let events = collect(runner(llm, tools, config(10)).start(ask("read"))).await;

        let StreamEvent::Error { message, kind } = &events[1] else {
            panic!("expected error, got {events:?}");
        };
        assert_eq!(*kind, ErrorKind::Session);
        assert!(message.contains("no chrome"), "{message}");
    }

    #[tokio::test]
    async fn test_cancel_during_tool_lets_it_finish() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[("call_1", "read", json!({"selector": "h1"}))]));
        llm.queue_response(text_response("never requested"));

        let tools = Arc::new(
            MockToolExecutor::new()
                .with_tool("read", ToolOutput::success("Example Domain"))
                .with_delay(Duration::from_millis(200)),
        );
        let run = runner(llm.clone(), tools.clone(), config(10)).start(ask("read"));
        let (mut events, guard) = run.into_parts();

        tokio::time::timeout(Duration::from_secs(2), tools.execution_started.notified())
            .await
            .expect("tool should start");
        drop(guard);

        let mut rest = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(2), events.recv()).await
        {
            rest.push(event);
        }

        // tool-start was queued before the cancel; nothing after it
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0], StreamEvent::ToolStart { .. }));
        assert_eq!(tools.completed_count(), 1);
        assert_eq!(llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_llm_request_is_prompt() {
        let llm = Arc::new(MockLlmClient::new("test-model").with_delay(Duration::from_secs(30)));
        llm.queue_response(text_response("discarded"));

        let tools = Arc::new(MockToolExecutor::new());
        let run = runner(llm.clone(), tools, config(10)).start(ask("hi"));
        let (mut events, guard) = run.into_parts();

        tokio::time::timeout(Duration::from_secs(2), llm.request_started.notified())
            .await
            .expect("request should start");
        drop(guard);

        let closed = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("loop should stop promptly");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_dropped_run_stops_loop() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(tool_response(&[("call_1", "read", json!({"selector": "h1"}))]));
        llm.queue_response(text_response("never requested"));

        let tools = Arc::new(
            MockToolExecutor::new()
                .with_tool("read", ToolOutput::success("text"))
                .with_delay(Duration::from_millis(100)),
        );
        let run = runner(llm.clone(), tools.clone(), config(10)).start(ask("read"));
        tokio::time::timeout(Duration::from_secs(2), tools.execution_started.notified())
            .await
            .expect("tool should start");
        drop(run);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(tools.completed_count(), 1);
        assert_eq!(llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_final_answer() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(text_response("Hello there"));
        let run = runner(llm, Arc::new(MockToolExecutor::new()), config(10)).start(ask("hi"));
        assert_eq!(run.final_answer().await.unwrap(), "Hello there");

        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_error(LlmError::rate_limit("slow down"));
        let run = runner(llm, Arc::new(MockToolExecutor::new()), config(10)).start(ask("hi"));
        assert_eq!(
            run.final_answer().await,
            Err(RunFailure {
                kind: ErrorKind::Model,
                message: "slow down".into(),
            })
        );
    }
}
