use autofy_config::BrowserConfig;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
}

fn desktop_profiles() -> Vec<UserAgentProfile> {
    vec![
        UserAgentProfile {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            viewport: (1920, 1080),
            platform: "Win32".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        },
        UserAgentProfile {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            viewport: (1920, 1080),
            platform: "MacIntel".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        },
    ]
}

/// Pick a desktop profile for the session. The configured viewport always
/// wins, as does an explicit user agent.
pub fn session_profile(config: &BrowserConfig) -> UserAgentProfile {
    let mut profile = desktop_profiles()
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| UserAgentProfile {
            user_agent: String::new(),
            viewport: (0, 0),
            platform: "Win32".to_string(),
            languages: vec!["en-US".to_string()],
        });
    profile.viewport = (config.viewport_width, config.viewport_height);
    if let Some(ua) = config.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) {
        profile.user_agent = ua.to_string();
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_overrides_viewport_and_agent() {
        let config = BrowserConfig {
            viewport_width: 1280,
            viewport_height: 720,
            user_agent: Some("Custom/2.0".into()),
            ..Default::default()
        };
        let p = session_profile(&config);
        assert_eq!(p.viewport, (1280, 720));
        assert_eq!(p.user_agent, "Custom/2.0");
    }

    #[test]
    fn default_profile_is_a_desktop_chrome() {
        let p = session_profile(&BrowserConfig::default());
        assert_eq!(p.viewport, (1920, 1080));
        assert!(p.user_agent.contains("Chrome/"));
    }
}
