//! chromiumoxide backend
//!
//! Tries system Chrome first. When none is found, a compatible Chromium is
//! downloaded with `BrowserFetcher` and cached for future runs.

use super::driver::{BrowserDriver, BrowserHandle, PageHandle};
use super::session::BrowserError;
use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::CaptureScreenshotFormat,
    element::Element,
    fetcher::{BrowserFetcher, BrowserFetcherOptions},
    handler::viewport::Viewport,
    page::ScreenshotParams,
    Page,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

/// How often a missing selector is looked up again
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        BrowserError::OperationFailed(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    /// Upper bound for navigation and for waiting on selectors
    pub interaction_timeout: Duration,
}

pub struct ChromiumDriver {
    options: ChromiumOptions,
}

impl ChromiumDriver {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    /// Directory where the fetcher caches downloaded Chrome binaries
    fn fetcher_cache_dir() -> PathBuf {
        let base = std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from);
        base.join(".cache/browser-agent/chromium")
    }

    fn browser_config(&self, executable: Option<&Path>) -> Result<BrowserConfig, BrowserError> {
        let user_data_dir =
            std::env::temp_dir().join(format!("browser-agent-chrome-{}", std::process::id()));
        // Stale profile dirs from a crashed run hold Chrome's SingletonLock
        let _ = std::fs::remove_dir_all(&user_data_dir);

        let mut builder = BrowserConfig::builder();
        builder = if self.options.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        builder = builder
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .user_data_dir(&user_data_dir)
            .viewport(Viewport {
                width: DEFAULT_VIEWPORT_WIDTH,
                height: DEFAULT_VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            });

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::LaunchFailed)
    }

    async fn launch_with(
        &self,
        executable: Option<&Path>,
    ) -> Result<ChromiumBrowser, BrowserError> {
        let config = self.browser_config(executable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        Ok(ChromiumBrowser {
            browser,
            handler_task,
            interaction_timeout: self.options.interaction_timeout,
        })
    }

    async fn fetch_chromium() -> Result<PathBuf, BrowserError> {
        let cache_dir = Self::fetcher_cache_dir();
        tracing::info!("Downloading Chrome to {cache_dir:?} (first run only)...");

        tokio::fs::create_dir_all(&cache_dir).await.map_err(|e| {
            BrowserError::LaunchFailed(format!(
                "Failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;

        let fetcher_opts = BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("Fetcher config error: {e}")))?;

        let info = BrowserFetcher::new(fetcher_opts)
            .fetch()
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("Chrome download failed: {e:#}")))?;

        tracing::info!("Using Chrome at {:?}", info.executable_path);
        Ok(info.executable_path)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError> {
        match self.launch_with(None).await {
            Ok(browser) => return Ok(Arc::new(browser)),
            Err(e) => {
                tracing::info!("System Chrome not available ({e}), trying fetcher...");
            }
        }

        let executable = Self::fetch_chromium().await?;
        Ok(Arc::new(self.launch_with(Some(&executable)).await?))
    }
}

struct ChromiumBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    interaction_timeout: Duration,
}

#[async_trait]
impl BrowserHandle for ChromiumBrowser {
    fn is_alive(&self) -> bool {
        // The handler stream ends when the CDP connection drops
        !self.handler_task.is_finished()
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageFailed(e.to_string()))?;

        Ok(Arc::new(ChromiumPage {
            id: uuid::Uuid::new_v4().to_string(),
            page,
            closed: AtomicBool::new(false),
            timeout: self.interaction_timeout,
        }))
    }
}

struct ChromiumPage {
    id: String,
    page: Page,
    closed: AtomicBool,
    timeout: Duration,
}

impl ChromiumPage {
    /// Poll for the first element matching `selector` until the timeout
    async fn wait_for(&self, selector: &str) -> Result<Element, BrowserError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if Instant::now() >= deadline => {
                    tracing::debug!(selector, error = %e, "Selector never matched");
                    return Err(BrowserError::ElementNotFound {
                        selector: selector.to_string(),
                        timeout: self.timeout,
                    });
                }
                Err(_) => tokio::time::sleep(SELECTOR_POLL_INTERVAL).await,
            }
        }
    }

    async fn call_on(
        &self,
        element: &Element,
        function: String,
    ) -> Result<Option<serde_json::Value>, BrowserError> {
        let returns = element.call_js_fn(function, false).await?;
        if let Some(exception) = returns.exception_details {
            return Err(BrowserError::OperationFailed(exception.text));
        }
        Ok(returns.result.value)
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return true;
        }
        // A page whose target is gone no longer answers CDP calls
        let gone = self.page.url().await.is_err();
        if gone {
            self.closed.store(true, Ordering::Release);
        }
        gone
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(self.timeout)),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.wait_for(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.wait_for(selector).await?;
        let value = serde_json::to_string(value)
            .map_err(|e| BrowserError::OperationFailed(e.to_string()))?;
        let function = format!(
            "function() {{
                if (!('value' in this)) {{
                    throw new Error('Element is not an <input>, <textarea> or <select> element');
                }}
                this.focus();
                this.value = {value};
                this.dispatchEvent(new Event('input', {{ bubbles: true }}));
                this.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }}"
        );
        self.call_on(&element, function).await?;
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let element = self.wait_for(selector).await?;
        let value = self
            .call_on(&element, "function() { return this.textContent; }".to_string())
            .await?;
        Ok(match value {
            Some(serde_json::Value::String(text)) => Some(text),
            _ => None,
        })
    }

    async fn screenshot(&self, path: &Path, selector: Option<&str>) -> Result<(), BrowserError> {
        let png = if let Some(selector) = selector {
            let element = self.wait_for(selector).await?;
            element.screenshot(CaptureScreenshotFormat::Png).await?
        } else {
            let params = ScreenshotParams::builder().full_page(true).build();
            tokio::time::timeout(self.timeout, self.page.screenshot(params))
                .await
                .map_err(|_| BrowserError::Timeout(self.timeout))??
        };

        tokio::fs::write(path, &png)
            .await
            .map_err(|e| BrowserError::ArtifactFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}
