use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of the most recent analyze pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Pending,
    ScrollRequired,
    Done,
    Aborted,
}

/// Everything the workflow knows about the run so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub task: String,
    pub url: Option<String>,
    /// One entry per successful analysis, in page order.
    pub summaries: Vec<String>,
    pub status: Status,
    /// Analyze executions, whether or not they produced a summary.
    pub passes: usize,
}

impl AgentState {
    pub fn new(task: impl Into<String>, url: Option<String>) -> Self {
        Self {
            task: task.into(),
            url: url.filter(|u| !u.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn scroll_count(&self) -> usize {
        self.summaries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    /// The report model call gave up; the raw notes were written instead.
    ReportFallback,
    /// No target page could be found.
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::ReportFallback => "ReportFallback",
            Self::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: String,
    pub report_path: PathBuf,
    pub url: Option<String>,
    pub summaries: usize,
    pub status: RunStatus,
}
