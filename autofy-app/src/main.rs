use anyhow::{Context, Result};
use autofy_common::observability::{LogConfig, LogFormat, init_logging};
use autofy_config::{AutofyConfig, AutofyConfigLoader, LoggingConfig};
use clap::Parser;
use cli::{Cli, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod check_key;
mod cli;
mod run;

const DEFAULT_CONFIG_FILE: &str = "autofy.yaml";

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::CheckKey { config } => check_key::execute(config.as_deref()),
    }
}

/// Load `path` when given, else `./autofy.yaml` if it exists. Environment
/// overrides apply either way.
pub(crate) fn load_config(path: Option<&Path>) -> Result<AutofyConfig> {
    let loader = match path {
        Some(p) => AutofyConfigLoader::new().with_file(p),
        None => AutofyConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().with_context(|| match path {
        Some(p) => format!("loading config from {}", p.display()),
        None => "loading configuration".to_string(),
    })
}

/// Install file logging per the `logging` section. Returns the log file.
pub(crate) fn start_logging(logging: &LoggingConfig) -> Result<PathBuf> {
    let format: LogFormat = logging.format.parse()?;
    init_logging(LogConfig {
        log_dir: logging.dir.clone(),
        emit_stderr: logging.stderr,
        format,
        ..LogConfig::default()
    })
}
