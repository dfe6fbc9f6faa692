//! Loader for Autofy configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field has one, so an empty file is valid),
//! 2. YAML files / inline snippets, in the order they were attached,
//! 3. `AUTOFY__SECTION__KEY` environment variables.
//!
//! After merging, `${VAR}` placeholders in string values are expanded from the
//! process environment (recursively, up to a fixed depth).
//!
//! ```yaml
//! llm:
//!   provider: gemini
//!   model: gemini-flash-latest
//!   api_key: "${GOOGLE_API_KEY}"
//! browser:
//!   headless: true
//! agent:
//!   max_scrolls: 5
//!   pacing_secs: 2
//!   scroll:
//!     mode: pixels
//!     pixels: 1000
//! output:
//!   report_path: mission_report.md
//! ```
use autofy_common::StealthLevel;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava";

pub const GEMINI_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutofyConfig {
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
    pub agent: AgentConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Model provider, selected by the `provider` key (`gemini` when absent).
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawLlmConfig")]
pub enum LlmConfig {
    Gemini {
        model: String,
        api_key: Option<String>,
        temperature: f32,
        endpoint: String,
    },
    Openai {
        model: String,
        api_key: Option<String>,
        temperature: f32,
        endpoint: String,
    },
    Ollama {
        model: String,
        endpoint: String,
        temperature: f32,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Provider {
    #[default]
    Gemini,
    Openai,
    Ollama,
}

/// Flat form of the `llm` section, so a single overridden key
/// (`AUTOFY__LLM__MODEL`) does not need the provider spelled out too.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLlmConfig {
    provider: Provider,
    model: Option<String>,
    api_key: Option<String>,
    temperature: f32,
    endpoint: Option<String>,
}

impl From<RawLlmConfig> for LlmConfig {
    fn from(raw: RawLlmConfig) -> Self {
        match raw.provider {
            Provider::Gemini => Self::Gemini {
                model: raw.model.unwrap_or_else(default_gemini_model),
                api_key: raw.api_key,
                temperature: raw.temperature,
                endpoint: raw.endpoint.unwrap_or_else(default_gemini_endpoint),
            },
            Provider::Openai => Self::Openai {
                model: raw.model.unwrap_or_else(default_openai_model),
                api_key: raw.api_key,
                temperature: raw.temperature,
                endpoint: raw.endpoint.unwrap_or_else(default_openai_endpoint),
            },
            Provider::Ollama => Self::Ollama {
                model: raw.model.unwrap_or_else(default_ollama_model),
                endpoint: raw.endpoint.unwrap_or_else(default_ollama_endpoint),
                temperature: raw.temperature,
            },
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::Gemini {
            model: default_gemini_model(),
            api_key: None,
            temperature: 0.0,
            endpoint: default_gemini_endpoint(),
        }
    }
}

impl LlmConfig {
    /// Environment variable the provider's key is read from when the file
    /// does not carry one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Gemini { .. } => Some(GEMINI_API_KEY_ENV),
            Self::Openai { .. } => Some(OPENAI_API_KEY_ENV),
            Self::Ollama { .. } => None,
        }
    }

    /// Resolve the API key: a configured value first, then the provider's
    /// environment variable. Unexpanded `${...}` placeholders count as unset.
    pub fn api_key(&self) -> Option<String> {
        let configured = match self {
            Self::Gemini { api_key, .. } | Self::Openai { api_key, .. } => api_key.as_deref(),
            Self::Ollama { .. } => None,
        };
        configured
            .filter(|k| !k.trim().is_empty() && !k.contains("${"))
            .map(str::to_string)
            .or_else(|| {
                self.api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini { model, .. } | Self::Openai { model, .. } | Self::Ollama { model, .. } => {
                model
            }
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Gemini { .. } => "gemini",
            Self::Openai { .. } => "openai",
            Self::Ollama { .. } => "ollama",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver by default).
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Overrides the fingerprint profile's user agent.
    pub user_agent: Option<String>,
    pub navigation_timeout_secs: u64,
    /// Pause after navigation so page scripts can settle.
    pub settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: false,
            stealth: StealthLevel::Balanced,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: None,
            navigation_timeout_secs: 60,
            settle_ms: 3000,
        }
    }
}

/// How far a single scroll step moves the page, selected by `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RawScrollConfig")]
pub enum ScrollConfig {
    /// A fraction of `window.innerHeight`.
    Viewport { fraction: f64 },
    /// A fixed pixel distance.
    Pixels { pixels: u32 },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScrollMode {
    #[default]
    Viewport,
    Pixels,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScrollConfig {
    mode: ScrollMode,
    fraction: Option<f64>,
    pixels: Option<u32>,
}

impl From<RawScrollConfig> for ScrollConfig {
    fn from(raw: RawScrollConfig) -> Self {
        match raw.mode {
            ScrollMode::Viewport => Self::Viewport {
                fraction: raw.fraction.unwrap_or_else(default_scroll_fraction),
            },
            ScrollMode::Pixels => Self::Pixels {
                pixels: raw.pixels.unwrap_or_else(default_scroll_pixels),
            },
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self::Viewport {
            fraction: default_scroll_fraction(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Summaries collected before the agent stops regardless of the model.
    pub max_scrolls: usize,
    /// Summaries required before the model is allowed to stop.
    pub min_summaries: usize,
    /// Cap on analyze passes, including failed captures. Defaults to
    /// twice `max_scrolls`.
    pub max_passes: Option<usize>,
    /// Sleep before every model call.
    pub pacing_secs: u64,
    /// Characters of page text sent with each screenshot.
    pub text_limit: usize,
    pub scroll: ScrollConfig,
    pub scroll_settle_ms: u64,
    pub capture_settle_ms: u64,
    /// Search page used when no target URL is given. `{query}` is replaced
    /// with the URL-encoded task.
    pub search_url: String,
    pub search_timeout_secs: u64,
    /// Target used instead of a web search when no URL is given.
    pub default_url: Option<String>,
}

impl AgentConfig {
    pub fn effective_max_passes(&self) -> usize {
        self.max_passes
            .unwrap_or_else(|| self.max_scrolls.saturating_mul(2))
            .max(1)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_scrolls: 7,
            min_summaries: 1,
            max_passes: None,
            pacing_secs: 5,
            text_limit: 12_000,
            scroll: ScrollConfig::default(),
            scroll_settle_ms: 2000,
            capture_settle_ms: 500,
            search_url: "https://www.google.com/search?q={query}".into(),
            search_timeout_secs: 60,
            default_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    /// Base cooldown after a rate-limit error; multiplied by the attempt number.
    pub rate_limit_cooldown_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: PathBuf,
    pub raw_notes_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
    /// Characters of combined notes kept in the history row.
    pub history_report_chars: usize,
    /// Save every captured viewport here when set.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("report.md"),
            raw_notes_path: Some(PathBuf::from("raw_notes_backup.txt")),
            history_path: Some(PathBuf::from("agent_history.csv")),
            history_report_chars: 5000,
            screenshot_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `text` or `json`.
    pub format: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".into(),
            dir: None,
            stderr: false,
        }
    }
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.into()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_scroll_fraction() -> f64 {
    0.8
}
fn default_scroll_pixels() -> u32 {
    1000
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

impl AutofyConfig {
    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_scrolls == 0 {
            return Err(ConfigError::Message("agent.max_scrolls must be at least 1".into()));
        }
        if self.agent.text_limit == 0 {
            return Err(ConfigError::Message("agent.text_limit must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message("retry.max_attempts must be at least 1".into()));
        }
        if let ScrollConfig::Viewport { fraction } = self.agent.scroll {
            if !(fraction > 0.0 && fraction <= 2.0) {
                return Err(ConfigError::Message(format!(
                    "agent.scroll.fraction must be in (0, 2], got {fraction}"
                )));
            }
        }
        if !self.agent.search_url.contains("{query}") {
            return Err(ConfigError::Message(
                "agent.search_url must contain a {query} placeholder".into(),
            ));
        }
        Ok(())
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct AutofyConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for AutofyConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AutofyConfigLoader {
    /// ```
    /// use autofy_config::AutofyConfigLoader;
    ///
    /// let config = AutofyConfigLoader::new()
    ///     .with_yaml_str("agent:\n  max_scrolls: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.agent.max_scrolls, 3);
    /// assert_eq!(config.agent.min_summaries, 1);
    /// assert_eq!(config.retry.max_attempts, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use autofy_config::{AutofyConfigLoader, LlmConfig, ScrollConfig};
    ///
    /// let cfg = AutofyConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: ollama
    ///   model: llava:13b
    /// agent:
    ///   scroll:
    ///     mode: pixels
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(matches!(cfg.llm, LlmConfig::Ollama { ref model, .. } if model == "llava:13b"));
    /// assert_eq!(cfg.agent.scroll, ScrollConfig::Pixels { pixels: 1000 });
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, apply `AUTOFY__` overrides, expand `${VAR}`
    /// placeholders, and validate.
    ///
    /// Environment values stay strings until the typed pass, where `config`
    /// coerces them per field: `AUTOFY__AGENT__MAX_SCROLLS=3` becomes a
    /// number while a digit-only `AUTOFY__LLM__API_KEY` stays a string.
    pub fn load(self) -> Result<AutofyConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("AUTOFY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: AutofyConfig = Config::try_from(&v)?.try_deserialize()?;
        typed.validate()?;

        Ok(typed)
    }
}
