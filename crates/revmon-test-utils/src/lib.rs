//! Testing utilities for the review monitor workspace
//!
//! Shared builders for execution records, patch envelopes and wire frames,
//! plus a scripted command backend.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use json_patch::Patch;
use parking_lot::Mutex;
use revmon_lifecycle::{ActivityKind, CommandError, ExecutionRecord, ExecutionStatus, ReviewCommands};
use revmon_stream::{LogEntry, PatchEnvelope};
use serde_json::{json, Value};
use std::collections::VecDeque;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn record(id: &str, kind: ActivityKind, status: ExecutionStatus) -> ExecutionRecord {
    let finished = !matches!(status, ExecutionStatus::Running);
    ExecutionRecord {
        id: id.to_string(),
        activity_kind: kind,
        status,
        started_at: base_time(),
        completed_at: finished.then(|| base_time() + Duration::minutes(5)),
        summary: None,
    }
}

pub fn review_record(id: &str, status: ExecutionStatus) -> ExecutionRecord {
    record(id, ActivityKind::Review, status)
}

pub fn coding_record(id: &str, status: ExecutionStatus) -> ExecutionRecord {
    record(id, ActivityKind::CodingAgent, status)
}

pub fn patch(operations: Value) -> Patch {
    serde_json::from_value(operations).unwrap()
}

/// `add` of one entry at `index`
pub fn add_op(index: usize, entry: &LogEntry) -> Value {
    json!({ "op": "add", "path": format!("/entries/{index}"), "value": entry.to_value() })
}

/// `add` ops appending stdout lines starting at `start`
pub fn stdout_ops(start: usize, lines: &[&str]) -> Value {
    Value::Array(
        lines
            .iter()
            .enumerate()
            .map(|(offset, line)| add_op(start + offset, &LogEntry::StdOut((*line).to_string())))
            .collect(),
    )
}

pub fn append_stdout(start: usize, lines: &[&str]) -> PatchEnvelope {
    PatchEnvelope::patch(patch(stdout_ops(start, lines)))
}

/// Envelope replacing the whole document
pub fn resync(entries: &[LogEntry]) -> PatchEnvelope {
    let values: Vec<Value> = entries.iter().map(LogEntry::to_value).collect();
    PatchEnvelope::patch(patch(json!([
        { "op": "replace", "path": "/entries", "value": values }
    ])))
}

pub fn wire_patch_frame(operations: &Value) -> String {
    json!({ "JsonPatch": operations }).to_string()
}

pub fn wire_finished_frame() -> String {
    json!({ "finished": true }).to_string()
}

/// Scripted backend: replies are consumed in order, `Ok` once exhausted
#[derive(Debug, Default)]
pub struct ScriptedCommands {
    replies: Mutex<VecDeque<Result<(), String>>>,
    starts: Mutex<Vec<String>>,
    retries: Mutex<Vec<String>>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: &str) {
        self.replies.lock().push_back(Err(message.to_string()));
    }

    pub fn starts(&self) -> Vec<String> {
        self.starts.lock().clone()
    }

    pub fn retries(&self) -> Vec<String> {
        self.retries.lock().clone()
    }

    fn reply(&self) -> Result<(), CommandError> {
        match self.replies.lock().pop_front() {
            Some(Err(message)) => Err(CommandError::rejected(message)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ReviewCommands for ScriptedCommands {
    async fn request_start(&self, attempt_id: &str) -> Result<(), CommandError> {
        self.starts.lock().push(attempt_id.to_string());
        self.reply()
    }

    async fn request_retry(&self, attempt_id: &str) -> Result<(), CommandError> {
        self.retries.lock().push(attempt_id.to_string());
        self.reply()
    }
}
