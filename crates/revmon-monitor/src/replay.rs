//! Offline replay of recorded review runs
//!
//! Loads an execution records snapshot and a recorded log stream (one wire
//! frame per line), drives them through a [`ReviewMonitor`] backed by the
//! in-process channel transport, and renders the outcome.

use crate::error::MonitorError;
use crate::monitor::ReviewMonitor;
use revmon_lifecycle::{
    ExecutionRecord, ReviewCommands, ReviewConfig, ReviewSnapshot, ReviewStatus,
};
use revmon_stream::{ChannelTransport, PatchEnvelope, SyncEvent, ViewEntry};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Result of one replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Review state after all records were applied
    pub snapshot: ReviewSnapshot,
    /// Projected log view; empty when logs are not shown
    pub entries: Vec<ViewEntry>,
    /// Non-fatal corruption warnings, in arrival order
    pub warnings: Vec<String>,
    /// Stream ended with a transport failure
    pub failure: Option<String>,
    /// Stream signalled completion
    pub finished: bool,
}

/// Load the review config at `path`, or the defaults when `None`
///
/// # Errors
/// Returns `MonitorError::Config` if the file is unreadable or invalid
pub fn load_config(path: Option<&Path>) -> Result<ReviewConfig, MonitorError> {
    match path {
        Some(path) => Ok(ReviewConfig::load(path)?),
        None => Ok(ReviewConfig::default()),
    }
}

/// Read an execution records snapshot (JSON array)
///
/// # Errors
/// - `MonitorError::Io` if the file cannot be read
/// - `MonitorError::Records` if it is not a list of records
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<ExecutionRecord>, MonitorError> {
    let path = path.as_ref();
    let source = read(path)?;
    serde_json::from_str(&source).map_err(|source| MonitorError::Records {
        path: path.to_path_buf(),
        source,
    })
}

/// Read recorded wire frames, skipping blank lines
///
/// # Errors
/// Returns `MonitorError::Io` if the file cannot be read
pub fn load_frames(path: impl AsRef<Path>) -> Result<Vec<String>, MonitorError> {
    let source = read(path.as_ref())?;
    Ok(source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn read(path: &Path) -> Result<String, MonitorError> {
    std::fs::read_to_string(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `records` to `monitor` and stream `frames` into its log subscription
///
/// Frames are only delivered when the derived state shows logs.
///
/// # Errors
/// Returns `MonitorError::Stream` if the log subscription cannot be opened
pub async fn replay<C: ReviewCommands>(
    monitor: &ReviewMonitor<ChannelTransport, C>,
    records: Vec<ExecutionRecord>,
    frames: &[String],
) -> Result<ReplayReport, MonitorError> {
    monitor.update_records(records).await?;

    let mut report = ReplayReport {
        snapshot: monitor.snapshot(),
        entries: Vec::new(),
        warnings: Vec::new(),
        failure: None,
        finished: false,
    };

    let Some(handle) = monitor.logs() else {
        tracing::info!(status = %report.snapshot.execution.status, "no review logs to replay");
        return Ok(report);
    };
    let Some(mut events) = handle.take_events() else {
        return Ok(report);
    };

    let transport = monitor.synchronizer().transport();
    for frame in frames {
        if !transport.push(handle.subject(), PatchEnvelope::from_wire(frame)).await {
            break;
        }
    }
    // recording without a final frame ends as a transport failure
    transport.disconnect(handle.subject());

    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Updated(_) => {}
            SyncEvent::Corrupted(err) => report.warnings.push(err.to_string()),
            SyncEvent::Failed(err) => {
                report.failure = Some(err.to_string());
                break;
            }
            SyncEvent::Finished => {
                report.finished = true;
                break;
            }
        }
    }

    report.entries = handle.view();
    Ok(report)
}

/// Human-readable status block
#[must_use]
pub fn render_status(snapshot: &ReviewSnapshot, max_retries: u32) -> String {
    let execution = &snapshot.execution;
    let mut out = String::new();
    let _ = writeln!(out, "status:   {}", execution.status);
    if let Some(process_id) = &execution.process_id {
        let _ = writeln!(out, "process:  {process_id}");
    }
    if execution.status != ReviewStatus::None {
        let _ = writeln!(out, "retries:  {}/{max_retries}", execution.retry_count);
    }
    if let Some(summary) = &execution.summary {
        let _ = writeln!(out, "summary:  {summary}");
    }
    if snapshot.can_retry {
        let _ = writeln!(out, "retry:    available");
    }
    if let Some(error) = snapshot.error.as_ref().or(execution.error_message.as_ref()) {
        let _ = writeln!(out, "error:    {error}");
    }
    out
}

/// One line per view entry: key, renderer tag, content
#[must_use]
pub fn render_entries(entries: &[ViewEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let content = entry
            .entry
            .text()
            .map_or_else(|| entry.entry.to_value()["content"].to_string(), str::to_string);
        let _ = writeln!(out, "{}\t{}\t{content}", entry.key, entry.kind.tag());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use revmon_lifecycle::ConfigError;
    use revmon_stream::{LogEntry, LogEntryKind};

    #[test]
    fn entries_render_text_and_records() {
        let entries = vec![
            ViewEntry {
                key: "r1:0".to_string(),
                kind: LogEntryKind::StdOut,
                entry: LogEntry::StdOut("reviewing".to_string()),
            },
            ViewEntry {
                key: "r1:1".to_string(),
                kind: LogEntryKind::NormalizedRecord,
                entry: LogEntry::NormalizedRecord(serde_json::json!({ "tool": "read" })),
            },
        ];

        let rendered = render_entries(&entries);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("r1:0\t"));
        assert!(lines[0].ends_with("\treviewing"));
        assert!(lines[1].ends_with(r#"{"tool":"read"}"#));
    }

    #[test]
    fn frames_skip_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.jsonl");
        std::fs::write(&path, "{\"finished\":true}\n\n  \n").unwrap();

        assert_eq!(load_frames(&path).unwrap(), vec![r#"{"finished":true}"#]);
    }

    #[test]
    fn config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.max_retries, ReviewConfig::DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn invalid_config_is_a_monitor_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.toml");
        std::fs::write(&path, "max_retries = 9\n").unwrap();

        assert!(matches!(
            load_config(Some(path.as_path())),
            Err(MonitorError::Config(ConfigError::MaxRetriesOutOfRange { value: 9, .. }))
        ));
        assert!(matches!(
            load_config(Some(dir.path().join("missing.toml").as_path())),
            Err(MonitorError::Config(ConfigError::Io { .. }))
        ));
    }

    #[test]
    fn malformed_records_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();

        assert!(matches!(load_records(&path), Err(MonitorError::Records { .. })));
    }
}
