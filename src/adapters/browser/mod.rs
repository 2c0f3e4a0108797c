// Browser layer: the page abstraction the carrier protocols drive, plus the
// WebDriver-backed implementation. Protocols only ever see `BrowserPage`, so
// tests can script a fake page instead of a real browser.

pub mod locator;
#[cfg(test)]
pub mod scripted;
pub mod webdriver;

pub use locator::{find_any, wait_for_any, Locator};
pub use webdriver::{WebDriverBrowser, WebDriverFactory};

use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Opaque reference to a located DOM element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    /// Single lookup attempt. `Ok(None)` means "not on the page right now",
    /// which is routine during fallback evaluation, not an error.
    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>>;
    async fn click(&self, element: &ElementHandle) -> Result<()>;
    /// Script-dispatched click, for controls whose delegated handlers swallow
    /// a synthetic WebDriver click.
    async fn click_js(&self, element: &ElementHandle) -> Result<()>;
    /// Clears the field, then types the text.
    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<()>;
    async fn text(&self, element: &ElementHandle) -> Result<String>;
    async fn attr(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;
    /// Visible text of the whole document, used for confirmation-screen and
    /// tracking-number scans.
    async fn page_text(&self) -> Result<String>;
    async fn is_checked(&self, element: &ElementHandle) -> Result<bool>;
    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<()>;
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;
    /// Waits for a file download triggered by the page and returns its full
    /// contents. Fails if nothing lands or the file is empty.
    async fn await_download(&self, timeout: Duration) -> Result<Vec<u8>>;
    async fn close(&self) -> Result<()>;
}

/// Produces a fresh browser session per issuance. Gateways own the lifecycle:
/// launch at the start of a call, close on every exit path.
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    type Page: BrowserPage;

    async fn launch(&self) -> Result<Self::Page>;
}
