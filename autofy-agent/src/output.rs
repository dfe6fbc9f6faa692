//! Files a run leaves behind: the report, a raw-notes backup, and one CSV
//! history row per run.
use crate::capture::truncate_chars;
use crate::state::RunStatus;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::Path;

pub const NO_CONTENT: &str = "No content gathered.";

pub const HISTORY_HEADER: [&str; 6] = [
    "Timestamp",
    "Target URL",
    "Task",
    "Summary Length",
    "Status",
    "Full Report",
];

/// Non-empty summaries separated by blank lines.
///
/// ```
/// use autofy_agent::output::combine_notes;
///
/// let notes = vec!["one".to_string(), "  ".to_string(), "two".to_string()];
/// assert_eq!(combine_notes(&notes), "one\n\ntwo");
/// assert_eq!(combine_notes(&[]), "No content gathered.");
/// ```
pub fn combine_notes(summaries: &[String]) -> String {
    let kept: Vec<&str> = summaries
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if kept.is_empty() {
        NO_CONTENT.to_string()
    } else {
        kept.join("\n\n")
    }
}

pub fn raw_notes(task: &str, combined: &str) -> String {
    format!("--- RAW NOTES for: {task} ---\n\n{combined}")
}

/// Report used when the model could not write one.
pub fn fallback_report(combined: &str) -> String {
    format!("AI Failed. Raw Notes:\n{combined}")
}

/// Write `content` to `path`, creating parent directories.
pub fn write_text(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub target_url: String,
    pub task: String,
    pub combined: String,
    pub status: RunStatus,
}

impl HistoryRow {
    fn record(&self, report_chars: usize) -> [String; 6] {
        [
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            self.target_url.clone(),
            self.task.clone(),
            self.combined.chars().count().to_string(),
            self.status.to_string(),
            truncate_chars(&self.combined, report_chars).to_string(),
        ]
    }
}

/// Append `row` to the CSV at `path`, writing the header when the file is
/// new or empty.
pub fn append_history(path: &Path, row: &HistoryRow, report_chars: usize) -> Result<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    if is_new {
        wtr.write_record(HISTORY_HEADER)
            .context("CSV header write error")?;
    }
    wtr.write_record(row.record(report_chars))
        .context("CSV row write error")?;
    wtr.flush().context("CSV flush error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: RunStatus) -> HistoryRow {
        HistoryRow {
            target_url: "https://en.wikipedia.org/wiki/LLM".into(),
            task: "history, briefly".into(),
            combined: "line one\n\nline \"two\"".into(),
            status,
        }
    }

    #[test]
    fn history_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent_history.csv");

        append_history(&path, &row(RunStatus::Success), 5000).unwrap();
        append_history(&path, &row(RunStatus::ReportFallback), 5000).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HISTORY_HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "history, briefly");
        assert_eq!(&rows[0][3], "20");
        assert_eq!(&rows[0][5], "line one\n\nline \"two\"");
        assert_eq!(&rows[1][4], "ReportFallback");
    }

    #[test]
    fn history_report_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        append_history(&path, &row(RunStatus::Success), 4).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let first = rdr.records().next().unwrap().unwrap();
        assert_eq!(&first[5], "line");
        assert_eq!(&first[3], "20");
    }

    #[test]
    fn raw_notes_and_fallback_format() {
        assert_eq!(raw_notes("t", "n"), "--- RAW NOTES for: t ---\n\nn");
        assert_eq!(fallback_report("n"), "AI Failed. Raw Notes:\nn");
    }

    #[test]
    fn write_text_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.md");
        write_text(&path, "# Report").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "# Report");
    }
}
