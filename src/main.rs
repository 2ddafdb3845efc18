//! Browser agent - LLM-driven web browsing over HTTP
//!
//! A Rust backend that runs a reasoning/acting loop against a language
//! model and a shared headless Chrome, streaming progress as NDJSON.

mod api;
mod config;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LoggingService, OpenAIService};
use runtime::{AgentRunner, ServiceLlmClient, ToolRegistryExecutor};
use std::net::SocketAddr;
use std::sync::Arc;
use tools::browser::{ChromiumDriver, ChromiumOptions};
use tools::{BrowserSessionManager, ScreenshotStore, ToolContext, ToolRegistry};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "browser_agent=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Model client
    let service = OpenAIService::new(&config.llm)?;
    tracing::info!(
        model = %config.llm.model,
        api_base = %config.llm.api_base,
        streaming = config.llm.streaming,
        "LLM client initialized"
    );
    let llm_client = ServiceLlmClient::new(Arc::new(LoggingService::new(Arc::new(service))));

    // Browser and tools; Chrome itself starts on the first tool call
    let driver = ChromiumDriver::new(ChromiumOptions {
        headless: config.browser.headless,
        interaction_timeout: config.browser.interaction_timeout,
    });
    let screenshots = ScreenshotStore::new(&config.screenshot_dir, &config.screenshot_url_prefix);
    screenshots.ensure_dir().await?;
    tracing::info!(dir = %config.screenshot_dir.display(), "Screenshot directory ready");

    let context = ToolContext::new(
        Arc::new(BrowserSessionManager::new(Arc::new(driver))),
        Arc::new(screenshots),
    );
    let executor = ToolRegistryExecutor::new(ToolRegistry::browser(), context);

    let runner = AgentRunner::new(Arc::new(llm_client), Arc::new(executor), config.agent.clone());
    tracing::info!(
        max_steps = config.agent.max_steps,
        llm_timeout_secs = config.agent.llm_timeout.as_secs(),
        "Agent runner ready"
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(runner, &config.screenshot_dir)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Browser agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
