use autofy_common::StealthLevel;
use autofy_config::{AutofyConfigLoader, LlmConfig, ScrollConfig};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
llm:
  provider: gemini
  model: gemini-2.0-flash
  api_key: "${AUTOFY_TEST_GEMINI_KEY}"
browser:
  headless: true
  stealth: maximum
agent:
  max_scrolls: 5
  pacing_secs: 2
  scroll:
    mode: viewport
    fraction: 0.5
output:
  report_path: out/mission_report.md
  history_path: ~
"#;

#[test]
#[serial]
fn loads_file_and_expands_placeholders() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "autofy.yaml", FILE_YAML);

    temp_env::with_var("AUTOFY_TEST_GEMINI_KEY", Some("abcde-secret-vwxyz"), || {
        let config = AutofyConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load config");

        match &config.llm {
            LlmConfig::Gemini { model, .. } => assert_eq!(model, "gemini-2.0-flash"),
            other => panic!("expected gemini, got {other:?}"),
        }
        assert_eq!(config.llm.api_key().as_deref(), Some("abcde-secret-vwxyz"));
        assert!(config.browser.headless);
        assert_eq!(config.browser.stealth, StealthLevel::Maximum);
        assert_eq!(config.agent.max_scrolls, 5);
        assert_eq!(config.agent.pacing_secs, 2);
        assert_eq!(config.agent.scroll, ScrollConfig::Viewport { fraction: 0.5 });
        assert_eq!(
            config.output.report_path,
            PathBuf::from("out/mission_report.md")
        );
        assert!(config.output.history_path.is_none());
        // untouched sections keep their defaults
        assert_eq!(config.retry.rate_limit_cooldown_secs, 30);
        assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    });
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "autofy.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("AUTOFY__AGENT__MAX_SCROLLS", Some("3")),
            ("AUTOFY__BROWSER__HEADLESS", Some("false")),
        ],
        || {
            let config = AutofyConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");
            assert_eq!(config.agent.max_scrolls, 3);
            assert!(!config.browser.headless);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = AutofyConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");

    assert!(matches!(config.llm, LlmConfig::Gemini { .. }));
    assert_eq!(config.llm.model(), "gemini-flash-latest");
    assert_eq!(config.agent.max_scrolls, 7);
    assert_eq!(config.agent.text_limit, 12_000);
    assert_eq!(config.output.report_path, PathBuf::from("report.md"));
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = AutofyConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    let result = AutofyConfigLoader::new()
        .with_yaml_str("retry:\n  max_attempts: 0\n")
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn single_llm_key_from_environment_keeps_default_provider() {
    temp_env::with_var("AUTOFY__LLM__MODEL", Some("gemini-2.0-flash"), || {
        let config = AutofyConfigLoader::new().load().expect("load config");
        match &config.llm {
            LlmConfig::Gemini { model, endpoint, .. } => {
                assert_eq!(model, "gemini-2.0-flash");
                assert!(endpoint.starts_with("https://generativelanguage"));
            }
            other => panic!("expected gemini, got {other:?}"),
        }
    });
}

#[test]
#[serial]
fn llm_section_without_provider_in_yaml() {
    let config = AutofyConfigLoader::new()
        .with_yaml_str("llm:\n  model: gemini-1.5-pro\n  temperature: 0.2\n")
        .load()
        .expect("load config");
    assert_eq!(config.llm.provider_name(), "gemini");
    assert_eq!(config.llm.model(), "gemini-1.5-pro");
}

#[test]
#[serial]
fn digit_only_key_from_environment_stays_a_string() {
    temp_env::with_vars(
        [
            ("AUTOFY__LLM__PROVIDER", Some("openai")),
            ("AUTOFY__LLM__API_KEY", Some("1234567890123")),
            ("AUTOFY__AGENT__PACING_SECS", Some("0")),
        ],
        || {
            let config = AutofyConfigLoader::new().load().expect("load config");
            assert_eq!(config.llm.provider_name(), "openai");
            assert_eq!(config.llm.api_key().as_deref(), Some("1234567890123"));
            assert_eq!(config.agent.pacing_secs, 0);
        },
    );
}

#[test]
#[serial]
fn environment_overrides_nested_scroll_settings() {
    temp_env::with_vars(
        [
            ("AUTOFY__AGENT__SCROLL__MODE", Some("pixels")),
            ("AUTOFY__AGENT__SCROLL__PIXELS", Some("600")),
        ],
        || {
            let config = AutofyConfigLoader::new().load().expect("load config");
            assert_eq!(config.agent.scroll, ScrollConfig::Pixels { pixels: 600 });
        },
    );
}
