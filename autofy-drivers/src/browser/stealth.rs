use super::fingerprint::UserAgentProfile;
use autofy_common::StealthLevel;

/// Construct Chrome command-line arguments for a stealth level and
/// fingerprint.
pub fn build_stealth_arguments(
    level: StealthLevel,
    profile: &UserAgentProfile,
    headless: bool,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        format!("--user-agent={}", profile.user_agent),
        format!("--window-size={},{}", profile.viewport.0, profile.viewport.1),
        format!("--lang={}", profile.languages.join(",")),
    ];
    if level != StealthLevel::Lightweight {
        args.push("--disable-extensions".to_string());
        args.push("--disable-plugins-discovery".to_string());
    }
    if headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    } else if level == StealthLevel::Maximum {
        args.push("--disable-gpu".to_string());
    }
    args
}

/// JavaScript evasions applied after each navigation.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }

    pub fn webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }

    /// Scripts for `level`, in the order they should run.
    pub fn for_level(level: StealthLevel) -> Vec<&'static str> {
        match level {
            StealthLevel::Lightweight => vec![Self::core_evasions()],
            StealthLevel::Balanced => vec![Self::core_evasions()],
            StealthLevel::Maximum => vec![Self::core_evasions(), Self::webgl_evasions()],
        }
    }
}

/// Removes consent banners and turns fixed/sticky overlays into absolutely
/// positioned elements behind the content so they stay out of screenshots.
pub const DECLUTTER_SCRIPT: &str = r#"
    const banners = ['#onetrust-banner-sdk', '.cookie-banner', '#cookie-banner',
                     '.fc-consent-root', '#accept-cookies', '.popup-overlay'];
    banners.forEach(sel => document.querySelectorAll(sel).forEach(el => el.remove()));
    document.querySelectorAll('*').forEach(el => {
        const pos = window.getComputedStyle(el).position;
        if (pos === 'fixed' || pos === 'sticky') {
            el.style.position = 'absolute';
            el.style.zIndex = '-1';
        }
    });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserAgentProfile {
        UserAgentProfile {
            user_agent: "UA/1.0".into(),
            viewport: (1920, 1080),
            platform: "Win32".into(),
            languages: vec!["en-US".into(), "en".into()],
        }
    }

    #[test]
    fn headless_uses_new_mode() {
        let args = build_stealth_arguments(StealthLevel::Balanced, &profile(), true);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--user-agent=UA/1.0".to_string()));
        assert!(!args.iter().any(|a| a == "--headless"));
    }

    #[test]
    fn headed_lightweight_keeps_extensions() {
        let args = build_stealth_arguments(StealthLevel::Lightweight, &profile(), false);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.contains(&"--disable-extensions".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
    }

    #[test]
    fn maximum_adds_webgl_evasions() {
        assert_eq!(StealthScripts::for_level(StealthLevel::Balanced).len(), 1);
        assert_eq!(StealthScripts::for_level(StealthLevel::Maximum).len(), 2);
    }

    #[test]
    fn declutter_targets_known_banners() {
        for sel in ["#onetrust-banner-sdk", ".fc-consent-root", ".popup-overlay"] {
            assert!(DECLUTTER_SCRIPT.contains(sel));
        }
        assert!(DECLUTTER_SCRIPT.contains("zIndex = '-1'"));
    }
}
