//! Shared browser session

use super::driver::{BrowserDriver, BrowserHandle, PageHandle};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to open page: {0}")]
    PageFailed(String),

    #[error("Element not found: no element matches `{selector}` within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Browser operation failed: {0}")]
    OperationFailed(String),

    #[error("Failed to save screenshot to {}: {reason}", path.display())]
    ArtifactFailed { path: PathBuf, reason: String },
}

impl BrowserError {
    /// No usable page could be obtained
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::LaunchFailed(_) | Self::PageFailed(_))
    }
}

#[derive(Default)]
struct SessionState {
    browser: Option<Arc<dyn BrowserHandle>>,
    page: Option<Arc<dyn PageHandle>>,
}

/// Process-wide owner of the browser and its single page
pub struct BrowserSessionManager {
    driver: Arc<dyn BrowserDriver>,
    state: Mutex<SessionState>,
    in_use: Arc<Mutex<()>>,
}

impl BrowserSessionManager {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            state: Mutex::new(SessionState::default()),
            in_use: Arc::new(Mutex::new(())),
        }
    }

    /// Return the live page, launching the browser or opening a page as needed.
    ///
    /// Concurrent callers are serialized so at most one launch happens. A
    /// failed launch leaves nothing behind; the next call tries again. The
    /// browser is only replaced once its connection is gone.
    pub async fn acquire(&self) -> Result<Arc<dyn PageHandle>, BrowserError> {
        let mut state = self.state.lock().await;

        if let Some(page) = &state.page {
            if !page.is_closed().await {
                return Ok(page.clone());
            }
            tracing::info!(page_id = page.id(), "Page was closed, opening a new one");
            state.page = None;
        }

        if state.browser.as_ref().is_some_and(|b| !b.is_alive()) {
            tracing::warn!("Browser connection lost, relaunching");
            state.browser = None;
        }

        let browser = if let Some(browser) = &state.browser {
            browser.clone()
        } else {
            tracing::info!("Launching browser");
            let browser = self.driver.launch().await?;
            state.browser = Some(browser.clone());
            browser
        };

        let page = browser
            .new_page()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to open page"))?;
        tracing::info!(page_id = page.id(), "Opened page");
        state.page = Some(page.clone());
        Ok(page)
    }

    /// Acquire the page for the duration of one tool call.
    ///
    /// Only one lease exists at a time, so tool calls from concurrent
    /// requests never interleave on the shared page.
    pub async fn lease(&self) -> Result<PageLease, BrowserError> {
        let guard = self.in_use.clone().lock_owned().await;
        let page = self.acquire().await?;
        Ok(PageLease {
            page,
            _guard: guard,
        })
    }
}

/// Exclusive access to the shared page
pub struct PageLease {
    page: Arc<dyn PageHandle>,
    _guard: OwnedMutexGuard<()>,
}

impl Deref for PageLease {
    type Target = dyn PageHandle;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}
