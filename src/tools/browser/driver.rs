//! Seams between the session manager and a concrete browser backend

use super::session::BrowserError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Starts browser processes
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError>;
}

/// A running browser
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// False once the connection to the browser process is gone
    fn is_alive(&self) -> bool;

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, BrowserError>;
}

/// A single tab.
///
/// Element operations wait for `selector` to appear, up to the backend's
/// interaction timeout, before failing with `ElementNotFound`.
#[async_trait]
pub trait PageHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn is_closed(&self) -> bool;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Replace the value of an input-like element
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// `textContent` of the first match; `None` when the element has none
    async fn text_content(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// Write a PNG of the full page, or of one element when `selector` is given
    async fn screenshot(&self, path: &Path, selector: Option<&str>) -> Result<(), BrowserError>;
}
