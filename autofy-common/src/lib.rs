//! Common types shared across the Autofy crates.
//!
//! This crate holds the error type every layer converts into, the browser
//! stealth level, and the [`observability`] helpers used by the binary and
//! by integration tests. It stays small so every crate can depend on it.
//!
//! # Examples
//!
//! ```rust
//! use autofy_common::{AutofyError, StealthLevel};
//!
//! let level: StealthLevel = "maximum".parse().unwrap();
//! assert_eq!(level, StealthLevel::Maximum);
//!
//! let err = AutofyError::Config("missing api key".into());
//! assert_eq!(err.to_string(), "Configuration error: missing api key");
//! ```
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod observability;

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

impl FromStr for StealthLevel {
    type Err = AutofyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightweight" | "light" => Ok(Self::Lightweight),
            "balanced" => Ok(Self::Balanced),
            "maximum" | "max" => Ok(Self::Maximum),
            other => Err(AutofyError::Config(format!(
                "unknown stealth level '{other}'"
            ))),
        }
    }
}

/// Error types used across the Autofy workspace.
#[derive(thiserror::Error, Debug)]
pub enum AutofyError {
    /// The research agent failed to complete a step.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The browser driver reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Writing the report file failed.
    #[error("Output error: could not write {}: {source}", path.display())]
    Output {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled (Ctrl-C).
    #[error("Cancelled")]
    Cancelled,
}

/// Convenient alias for results that use [`AutofyError`].
pub type Result<T> = std::result::Result<T, AutofyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stealth_level_parses_aliases() {
        assert_eq!("light".parse::<StealthLevel>().unwrap(), StealthLevel::Lightweight);
        assert_eq!(" Balanced ".parse::<StealthLevel>().unwrap(), StealthLevel::Balanced);
        assert!("paranoid".parse::<StealthLevel>().is_err());
    }

    #[test]
    fn output_errors_name_the_path() {
        let err = AutofyError::Output {
            path: "out/report.md".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        };
        assert_eq!(
            err.to_string(),
            "Output error: could not write out/report.md: nope"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
