//! Browser automation tools using Chrome `DevTools` Protocol
//!
//! One browser and one page are shared by every request in the process.
//! The page is created lazily and replaced when it turns out to be closed.

mod artifacts;
mod chromium;
mod driver;
mod session;
mod tools;



pub use artifacts::ScreenshotStore;
pub use chromium::{ChromiumDriver, ChromiumOptions};
pub use session::{BrowserError, BrowserSessionManager, PageLease};
pub use tools::{ClickTool, FillTool, NavigateTool, ReadTool, ScreenshotTool};
