pub mod behavioral;
pub mod driver;
pub mod fingerprint;
pub mod page;
pub mod stealth;

use anyhow::Result;
use async_trait::async_trait;
use autofy_config::ScrollConfig;
use std::time::Duration;

/// Page operations the research workflow needs from a browser.
///
/// [`page::AutofyPage`] implements this over WebDriver; tests substitute an
/// in-memory page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load `url`. The page-load timeout is the session's.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Remove cookie banners and pin fixed/sticky overlays behind content.
    async fn declutter(&self) -> Result<()>;

    /// PNG of the visible viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// `document.body.innerText`, untruncated.
    async fn visible_text(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn scroll(&self, mode: &ScrollConfig) -> Result<()>;

    /// Run a web search and return the first organic result link, `None`
    /// when the results never render or none qualifies.
    async fn search_first_result(
        &self,
        search_url: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// End the WebDriver session.
    async fn close(&self) -> Result<()>;
}
