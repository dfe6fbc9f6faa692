use crate::browser::{
    behavioral::BehavioralEngine,
    fingerprint::{session_profile, UserAgentProfile},
    page::AutofyPage,
    stealth::build_stealth_arguments,
};
use anyhow::{Context, Result};
use autofy_common::StealthLevel;
use autofy_config::BrowserConfig;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver client with stealth and
/// behavioral helpers.
pub struct AutofyDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
    pub profile: UserAgentProfile,
    pub stealth: StealthLevel,
}

impl AutofyDriver {
    /// Start a browser session on the configured WebDriver endpoint
    /// (chromedriver at `http://localhost:9515` by default).
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let profile = session_profile(config);
        let args = build_stealth_arguments(config.stealth, &profile, config.headless);

        let mut chrome_opts = HashMap::new();
        chrome_opts.insert("args".to_string(), json!(args));
        chrome_opts.insert(
            "excludeSwitches".to_string(),
            json!(["enable-automation"]),
        );

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "could not start a browser session at {} (is chromedriver running?)",
                    config.webdriver_url
                )
            })?;

        let page_load = Duration::from_secs(config.navigation_timeout_secs.max(1));
        client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_load), None))
            .await
            .context("setting page-load timeout")?;

        info!(
            target: "browser",
            endpoint = %config.webdriver_url,
            headless = config.headless,
            stealth = ?config.stealth,
            "browser session started"
        );

        Ok(Self {
            client,
            behavioral_engine: BehavioralEngine::new(),
            profile,
            stealth: config.stealth,
        })
    }

    /// A page handle sharing this session.
    pub fn page(&self) -> AutofyPage {
        AutofyPage::new(
            self.client.clone(),
            self.stealth,
            self.profile.clone(),
            self.behavioral_engine.clone(),
        )
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
