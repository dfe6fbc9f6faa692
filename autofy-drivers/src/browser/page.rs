use crate::browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentProfile,
    stealth::{StealthScripts, DECLUTTER_SCRIPT},
    BrowserSession,
};
use anyhow::Result;
use async_trait::async_trait;
use autofy_common::StealthLevel;
use autofy_config::ScrollConfig;
use fantoccini::{Client, Locator};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Container the search engine renders organic results into.
pub const SEARCH_RESULTS_SELECTOR: &str = "div#search";

/// High-level page wrapper over a WebDriver session.
pub struct AutofyPage {
    pub(crate) client: Client,
    pub(crate) stealth: StealthLevel,
    pub(crate) profile: UserAgentProfile,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl AutofyPage {
    pub fn new(
        client: Client,
        stealth: StealthLevel,
        profile: UserAgentProfile,
        behavioral_engine: BehavioralEngine,
    ) -> Self {
        Self {
            client,
            stealth,
            profile,
            behavioral_engine,
        }
    }

    /// Stealth scripts are best effort; a page that rejects them is still usable.
    async fn apply_stealth(&self) {
        for script in StealthScripts::for_level(self.stealth) {
            if let Err(e) = self.client.execute(script, vec![]).await {
                debug!(target: "browser.stealth", error = %e, "evasion script failed");
            }
        }
        if self.stealth == StealthLevel::Maximum {
            let script = platform_override_script(&self.profile.platform);
            if let Err(e) = self.client.execute(&script, vec![]).await {
                debug!(target: "browser.stealth", error = %e, "platform override failed");
            }
        }
    }

    /// Href attributes of every anchor under the results container.
    async fn result_links(&self) -> Result<Vec<String>> {
        let anchors = self
            .client
            .find_all(Locator::Css(&format!("{SEARCH_RESULTS_SELECTOR} a")))
            .await?;
        let mut hrefs = Vec::with_capacity(anchors.len());
        for a in anchors {
            if let Some(href) = a.attr("href").await? {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }
}

#[async_trait]
impl BrowserSession for AutofyPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.behavioral_engine.random_delay(200, 800).await;
        self.client.goto(url).await?;
        self.apply_stealth().await;
        Ok(())
    }

    async fn declutter(&self) -> Result<()> {
        self.client.execute(DECLUTTER_SCRIPT, vec![]).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn visible_text(&self) -> Result<String> {
        let value = self
            .client
            .execute(
                "return document.body ? document.body.innerText : '';",
                vec![],
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn scroll(&self, mode: &ScrollConfig) -> Result<()> {
        match *mode {
            ScrollConfig::Viewport { fraction } => {
                self.client
                    .execute(
                        "window.scrollBy(0, window.innerHeight * arguments[0]);",
                        vec![json!(fraction)],
                    )
                    .await?;
            }
            ScrollConfig::Pixels { pixels } => {
                self.client
                    .execute("window.scrollBy(0, arguments[0]);", vec![json!(pixels)])
                    .await?;
            }
        }
        Ok(())
    }

    async fn search_first_result(
        &self,
        search_url: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let url = build_search_url(search_url, query);
        info!(target: "browser.search", %url, "searching");
        self.navigate(&url).await?;

        // A headed session leaves this window for solving a CAPTCHA by hand.
        if let Err(e) = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(SEARCH_RESULTS_SELECTOR))
            .await
        {
            warn!(target: "browser.search", error = %e, "search results never rendered");
            return Ok(None);
        }

        let links = self.result_links().await?;
        Ok(pick_result_link(&links, "google.com"))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

/// Pin `navigator.platform` to the session profile's value.
fn platform_override_script(platform: &str) -> String {
    format!(
        "Object.defineProperty(navigator, 'platform', {{ get: () => {} }});",
        serde_json::Value::from(platform)
    )
}

/// Fill `{query}` in a search URL template with the URL-encoded query.
pub fn build_search_url(template: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    template.replace("{query}", &encoded)
}

/// First absolute link that does not point back at the search engine.
pub fn pick_result_link(hrefs: &[String], engine_host: &str) -> Option<String> {
    hrefs
        .iter()
        .find(|h| h.starts_with("http") && !h.contains(engine_host))
        .cloned()
}
