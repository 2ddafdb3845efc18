//! The five browser tools exposed to the model

use super::session::BrowserError;
use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// navigate
// ============================================================================

static NAVIGATE: ToolSpec = ToolSpec {
    name: "navigate",
    description: "Navigates to a specific URL in the web browser.",
    params: &[ParamSpec {
        name: "url",
        kind: ParamType::String,
        required: true,
        description: "The fully qualified URL to navigate to (e.g., https://www.google.com).",
    }],
};

#[derive(Debug, Deserialize)]
struct NavigateInput {
    url: String,
}

pub struct NavigateTool;

#[async_trait]
impl Tool for NavigateTool {
    fn spec(&self) -> &'static ToolSpec {
        &NAVIGATE
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: NavigateInput = NAVIGATE.parse(input)?;

        if let Err(e) = reqwest::Url::parse(&input.url) {
            return Err(BrowserError::NavigationFailed {
                url: input.url,
                reason: format!("malformed URL ({e})"),
            }
            .into());
        }

        let page = ctx.page().await?;
        page.goto(&input.url).await?;
        Ok(format!("Navigated to {}", input.url))
    }
}

// ============================================================================
// click
// ============================================================================

static CLICK: ToolSpec = ToolSpec {
    name: "click",
    description:
        "Clicks on a specific element on the current web page, such as a button or a link.",
    params: &[ParamSpec {
        name: "selector",
        kind: ParamType::String,
        required: true,
        description: "The CSS selector to identify the element to click (e.g., `#submit-button`, `.product-link`).",
    }],
};

#[derive(Debug, Deserialize)]
struct SelectorInput {
    selector: String,
}

pub struct ClickTool;

#[async_trait]
impl Tool for ClickTool {
    fn spec(&self) -> &'static ToolSpec {
        &CLICK
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: SelectorInput = CLICK.parse(input)?;
        let page = ctx.page().await?;
        page.click(&input.selector).await?;
        Ok(format!("Clicked on {}", input.selector))
    }
}

// ============================================================================
// fill
// ============================================================================

static FILL: ToolSpec = ToolSpec {
    name: "fill",
    description: "Fills a form field on the current web page with a specified value.",
    params: &[
        ParamSpec {
            name: "selector",
            kind: ParamType::String,
            required: true,
            description: "The CSS selector for the input field to fill (e.g., `input[name=\"username\"]`).",
        },
        ParamSpec {
            name: "value",
            kind: ParamType::String,
            required: true,
            description: "The text to enter into the field.",
        },
    ],
};

#[derive(Debug, Deserialize)]
struct FillInput {
    selector: String,
    value: String,
}

pub struct FillTool;

#[async_trait]
impl Tool for FillTool {
    fn spec(&self) -> &'static ToolSpec {
        &FILL
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: FillInput = FILL.parse(input)?;
        let page = ctx.page().await?;
        page.fill(&input.selector, &input.value).await?;
        Ok(format!("Filled {} with {}", input.selector, input.value))
    }
}

// ============================================================================
// read
// ============================================================================

static READ: ToolSpec = ToolSpec {
    name: "read",
    description: "Reads the text content from a specific element on the current web page.",
    params: &[ParamSpec {
        name: "selector",
        kind: ParamType::String,
        required: true,
        description: "The CSS selector of the element to read text from (e.g., `h1`, `.article-body`).",
    }],
};

pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn spec(&self) -> &'static ToolSpec {
        &READ
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: SelectorInput = READ.parse(input)?;
        let page = ctx.page().await?;
        let text = page.text_content(&input.selector).await?;
        tracing::debug!(selector = %input.selector, found = text.is_some(), "Read text");
        Ok(text.unwrap_or_default())
    }
}

// ============================================================================
// screenshot
// ============================================================================

static SCREENSHOT: ToolSpec = ToolSpec {
    name: "screenshot",
    description: "Takes a screenshot of the current page. Can capture a specific element if a selector is provided, otherwise captures the full page.",
    params: &[ParamSpec {
        name: "selector",
        kind: ParamType::String,
        required: false,
        description: "The CSS selector of the element to capture. If omitted, the entire page will be captured.",
    }],
};

#[derive(Debug, Deserialize)]
struct ScreenshotInput {
    #[serde(default)]
    selector: Option<String>,
}

pub struct ScreenshotTool;

#[async_trait]
impl Tool for ScreenshotTool {
    fn spec(&self) -> &'static ToolSpec {
        &SCREENSHOT
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: ScreenshotInput = SCREENSHOT.parse(input)?;

        let store = ctx.screenshots();
        let shot = store.next();
        store
            .ensure_dir()
            .await
            .map_err(|e| BrowserError::ArtifactFailed {
                path: store.dir().to_path_buf(),
                reason: e.to_string(),
            })?;

        let page = ctx.page().await?;
        page.screenshot(&shot.path, input.selector.as_deref()).await?;
        Ok(format!("Screenshot saved to {}", shot.public_path))
    }
}
