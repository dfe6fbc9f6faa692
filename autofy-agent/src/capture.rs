use anyhow::{Context, Result};
use autofy_drivers::BrowserSession;
use std::time::Duration;
use tracing::debug;

/// One hybrid capture: what the viewport looks like plus what the page says.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Viewport PNG, not the full page.
    pub screenshot_png: Vec<u8>,
    pub text: String,
    pub url: String,
}

/// Cut `text` to at most `limit` characters, never splitting one.
///
/// ```
/// use autofy_agent::capture::truncate_chars;
///
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// assert_eq!(truncate_chars("short", 100), "short");
/// ```
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Declutter the page, let it settle, then take the screenshot and text.
pub async fn capture_page(
    browser: &dyn BrowserSession,
    settle: Duration,
    text_limit: usize,
) -> Result<PageContext> {
    // Overlays only cost screenshot quality; keep going if the script fails.
    if let Err(e) = browser.declutter().await {
        debug!(target: "agent.capture", error = %e, "declutter failed");
    }
    tokio::time::sleep(settle).await;

    let screenshot_png = browser.screenshot().await.context("taking screenshot")?;
    let text = browser.visible_text().await.context("reading page text")?;
    let url = browser.current_url().await.unwrap_or_default();

    Ok(PageContext {
        screenshot_png,
        text: truncate_chars(&text, text_limit).to_string(),
        url,
    })
}
