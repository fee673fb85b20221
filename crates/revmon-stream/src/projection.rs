//! Entry projection
//!
//! Turns one materialized record into a keyed view entry. Keys are derived
//! only from the subject and the position, so an unchanged entry keeps its
//! key across updates and the presentation layer can skip re-rendering it.

use crate::entry::{LogEntry, LogEntryKind};
use serde::Serialize;

/// Keyed, classified view of one log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    /// `"{subject}:{index}"`, unique within one render
    pub key: String,
    /// Renderer selector
    pub kind: LogEntryKind,
    /// The projected entry
    pub entry: LogEntry,
}

impl ViewEntry {
    /// List key used by the review log list
    #[inline]
    #[must_use]
    pub fn render_key(&self) -> String {
        format!("review-{}", self.key)
    }
}

/// Sequence key of the entry at `index` within `subject`
#[inline]
#[must_use]
pub fn sequence_key(subject: &str, index: usize) -> String {
    format!("{subject}:{index}")
}

/// Project one entry
#[must_use]
pub fn project(subject: &str, index: usize, entry: &LogEntry) -> ViewEntry {
    let kind = match entry {
        LogEntry::StdOut(_) => LogEntryKind::StdOut,
        LogEntry::StdErr(_) => LogEntryKind::StdErr,
        LogEntry::NormalizedRecord(_) => LogEntryKind::NormalizedRecord,
    };

    ViewEntry {
        key: sequence_key(subject, index),
        kind,
        entry: entry.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_key_and_kind() {
        let entry = LogEntry::StdErr("warning: unused".to_string());
        let view = project("exec-1", 4, &entry);

        assert_eq!(view.key, "exec-1:4");
        assert_eq!(view.kind, LogEntryKind::StdErr);
        assert_eq!(view.render_key(), "review-exec-1:4");
        assert_eq!(view.entry, entry);
    }

    #[test]
    fn project_is_deterministic() {
        let entry = LogEntry::NormalizedRecord(json!({"content": "done"}));
        assert_eq!(project("exec-2", 0, &entry), project("exec-2", 0, &entry));
    }

    #[test]
    fn keys_differ_across_subjects() {
        let entry = LogEntry::StdOut("same".to_string());
        assert_ne!(project("exec-1", 0, &entry).key, project("exec-2", 0, &entry).key);
    }
}
