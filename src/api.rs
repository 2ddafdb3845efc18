//! HTTP API for the browser agent
//!
//! `POST /api/chat` streams NDJSON records, `POST /api/chat/sync` waits for
//! the final answer, screenshots are served as static files.

mod handlers;
mod ndjson;
mod types;

pub use handlers::create_router;

use crate::runtime::AgentRunner;
use std::path::PathBuf;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: AgentRunner,
    pub screenshot_dir: PathBuf,
}

impl AppState {
    pub fn new(runner: AgentRunner, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            screenshot_dir: screenshot_dir.into(),
        }
    }
}
