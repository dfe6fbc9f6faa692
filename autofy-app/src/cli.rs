use autofy_config::AutofyConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_TASK: &str = "Summarize the history of LLMs.";

#[derive(Parser, Debug)]
#[command(name = "autofy")]
#[command(about = "Autonomous web research agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a task on a web page and write a markdown report
    Run(RunArgs),

    /// Show which API key will be used, masked
    CheckKey {
        /// YAML config file (defaults to ./autofy.yaml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Page to research; searched for when omitted
    #[arg(short, long)]
    pub url: Option<String>,

    /// Research objective; prompted for when omitted
    #[arg(short, long)]
    pub task: Option<String>,

    /// YAML config file (defaults to ./autofy.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many summaries
    #[arg(long)]
    pub max_scrolls: Option<usize>,

    /// Seconds to wait before each model call
    #[arg(long)]
    pub pacing: Option<u64>,

    /// Where to write the markdown report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// WebDriver endpoint
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Prompt for URL and task even when flags are given
    #[arg(short, long)]
    pub interactive: bool,
}

impl RunArgs {
    /// Flags win over file and environment configuration.
    pub fn apply(&self, config: &mut AutofyConfig) {
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(n) = self.max_scrolls {
            config.agent.max_scrolls = n;
        }
        if let Some(secs) = self.pacing {
            config.agent.pacing_secs = secs;
        }
        if let Some(path) = &self.report {
            config.output.report_path = path.clone();
        }
        if let Some(url) = &self.webdriver {
            config.browser.webdriver_url = url.clone();
        }
    }

    pub fn needs_prompt(&self) -> bool {
        self.interactive || self.task.is_none()
    }
}

/// Blank URL means "search for one"; blank task falls back to the default.
pub fn normalize_inputs(url: Option<String>, task: Option<String>) -> (Option<String>, String) {
    let url = url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let task = task
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TASK.to_string());
    (url, task)
}

/// `first5...last5`, or all stars for keys too short to show safely.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

/// Formatting problems that commonly break pasted keys.
pub fn key_warnings(key: &str) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if key.contains(char::is_whitespace) {
        warnings.push("key contains spaces");
    }
    if key.starts_with('"') || key.starts_with('\'') {
        warnings.push("key starts with a quote character");
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_override_config() {
        let cli = Cli::try_parse_from([
            "autofy",
            "run",
            "--task",
            "Who wrote it?",
            "--headless",
            "--max-scrolls",
            "3",
            "--pacing",
            "0",
            "--report",
            "out/r.md",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(!args.needs_prompt());

        let mut config = AutofyConfig::default();
        args.apply(&mut config);
        assert!(config.browser.headless);
        assert_eq!(config.agent.max_scrolls, 3);
        assert_eq!(config.agent.pacing_secs, 0);
        assert_eq!(config.output.report_path, PathBuf::from("out/r.md"));
        assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn missing_task_prompts() {
        let cli = Cli::try_parse_from(["autofy", "run", "--url", "https://example.org"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.needs_prompt());
    }

    #[test]
    fn blank_inputs_normalize() {
        assert_eq!(
            normalize_inputs(Some("  ".into()), Some("".into())),
            (None, DEFAULT_TASK.to_string())
        );
        assert_eq!(
            normalize_inputs(Some(" https://a.b ".into()), Some(" t ".into())),
            (Some("https://a.b".into()), "t".to_string())
        );
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key("AIzaSyA1234567890xyzKQ"), "AIzaS...xyzKQ");
        assert_eq!(mask_key("short"), "*****");
    }

    #[test]
    fn warns_about_pasted_keys() {
        assert!(key_warnings("AIzaSyA123").is_empty());
        assert_eq!(key_warnings("\"AIza Sy\"").len(), 2);
    }
}
