//! Output sinks
//!
//! Where the post phase publishes its results: step outputs, the job
//! summary page, and an optional JSON file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::error::{Error, Result};

/// File receiving step outputs on GitHub Actions runners
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// File receiving job summary markdown on GitHub Actions runners
pub const GITHUB_STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";

// ============================================================================
// Sink Trait
// ============================================================================

/// Destination for phase outputs and the job summary
pub trait OutputSink: Send + Sync {
    /// Publish a named output value
    fn set_output(&self, name: &str, value: &str) -> Result<()>;

    /// Append markdown to the job summary
    fn write_summary(&self, markdown: &str) -> Result<()>;
}

// ============================================================================
// GitHubActionsSink
// ============================================================================

/// Writes to the files GitHub Actions exposes through environment variables
///
/// When a file is not configured the write is skipped.
#[derive(Debug, Clone, Default)]
pub struct GitHubActionsSink {
    output_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
}

impl GitHubActionsSink {
    pub fn new(output_file: Option<PathBuf>, summary_file: Option<PathBuf>) -> Self {
        Self {
            output_file,
            summary_file,
        }
    }

    /// Read `GITHUB_OUTPUT` and `GITHUB_STEP_SUMMARY`
    pub fn from_env() -> Self {
        let path_from = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };
        Self::new(path_from(GITHUB_OUTPUT_ENV), path_from(GITHUB_STEP_SUMMARY_ENV))
    }

    fn append(path: &Path, content: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Pick a heredoc delimiter that does not occur in the value
fn output_delimiter(value: &str) -> String {
    let mut delimiter = format!(
        "ghadelimiter_{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    delimiter
}

/// Format one `name<<DELIM` record for the outputs file
pub fn format_output_record(name: &str, value: &str) -> String {
    let delimiter = output_delimiter(value);
    format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
}

impl OutputSink for GitHubActionsSink {
    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => Self::append(path, &format_output_record(name, value)),
            None => {
                log::debug!(
                    "[apitrack:output] {} not set; skipping output {}",
                    GITHUB_OUTPUT_ENV,
                    name
                );
                Ok(())
            }
        }
    }

    fn write_summary(&self, markdown: &str) -> Result<()> {
        match &self.summary_file {
            Some(path) => Self::append(path, markdown),
            None => {
                log::debug!(
                    "[apitrack:output] {} not set; skipping job summary",
                    GITHUB_STEP_SUMMARY_ENV
                );
                Ok(())
            }
        }
    }
}

// ============================================================================
// MemorySink
// ============================================================================

/// Records everything it is given
#[derive(Debug, Default)]
pub struct MemorySink {
    outputs: Mutex<Vec<(String, String)>>,
    summaries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value published under `name`
    pub fn output(&self, name: &str) -> Option<String> {
        let outputs = self.outputs.lock().ok()?;
        outputs
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn summaries(&self) -> Vec<String> {
        self.summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        self.outputs
            .lock()
            .map_err(|_| Error::internal("output sink lock poisoned"))?
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_summary(&self, markdown: &str) -> Result<()> {
        self.summaries
            .lock()
            .map_err(|_| Error::internal("output sink lock poisoned"))?
            .push(markdown.to_string());
        Ok(())
    }
}

// ============================================================================
// Output File
// ============================================================================

/// Write `value` as pretty JSON to `path`
///
/// A leading `~` is expanded. The parent directory is created unless it is
/// empty or `.`. Returns the path actually written.
pub fn write_output_file<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(raw.trim()).into_owned());
    if expanded.as_os_str().is_empty() {
        return Err(Error::config("Output path is empty"));
    }

    if let Some(parent) = expanded.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&expanded, json)?;
    log::info!("[apitrack:output] Wrote usage data to {}", expanded.display());

    Ok(expanded)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_record_format() {
        let record = format_output_record("usage", "{\"total\":1}");
        let lines: Vec<&str> = record.lines().collect();

        assert_eq!(lines.len(), 3);
        let delimiter = lines[0].strip_prefix("usage<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(lines[1], "{\"total\":1}");
        assert_eq!(lines[2], delimiter);
    }

    #[test]
    fn test_output_delimiter_avoids_value() {
        let first = output_delimiter("");
        let value = format!("{} and {}_", first, first);
        let delimiter = output_delimiter(&value);
        assert!(!value.contains(&delimiter));
    }

    #[test]
    fn test_actions_sink_appends_files() {
        let dir = TempDir::new().unwrap();
        let outputs = dir.path().join("output");
        let summary = dir.path().join("summary");
        let sink = GitHubActionsSink::new(Some(outputs.clone()), Some(summary.clone()));

        sink.set_output("usage", "1").unwrap();
        sink.set_output("other", "2").unwrap();
        sink.write_summary("## Heading\n").unwrap();

        let written = std::fs::read_to_string(&outputs).unwrap();
        assert!(written.starts_with("usage<<"));
        assert!(written.contains("\nother<<"));
        assert_eq!(std::fs::read_to_string(&summary).unwrap(), "## Heading\n");
    }

    #[test]
    fn test_actions_sink_without_files_is_noop() {
        let sink = GitHubActionsSink::default();
        assert!(sink.set_output("usage", "1").is_ok());
        assert!(sink.write_summary("x").is_ok());
    }

    #[test]
    fn test_memory_sink_keeps_latest_output() {
        let sink = MemorySink::new();
        sink.set_output("usage", "old").unwrap();
        sink.set_output("usage", "new").unwrap();
        sink.write_summary("md").unwrap();

        assert_eq!(sink.output("usage"), Some("new".to_string()));
        assert_eq!(sink.output("missing"), None);
        assert_eq!(sink.summaries(), vec!["md".to_string()]);
    }

    #[test]
    fn test_write_output_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/deeper/usage.json");

        let written = write_output_file(&target, &serde_json::json!({ "total": 3 })).unwrap();

        assert_eq!(written, target);
        let content = std::fs::read_to_string(&target).unwrap();
        assert_eq!(content, "{\n  \"total\": 3\n}");
    }

    #[test]
    fn test_write_output_file_rejects_blank_path() {
        let err = write_output_file(Path::new("  "), &1).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
