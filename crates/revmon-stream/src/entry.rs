//! Log entries
//!
//! A materialized record is one of a closed set of output kinds. Raw streams
//! carry text; normalized records carry an opaque structured payload that the
//! presentation layer renders on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogEntryKind {
    /// Standard output text
    StdOut,
    /// Standard error text
    StdErr,
    /// Structured record produced by log normalization
    NormalizedRecord,
}

impl LogEntryKind {
    /// Wire tag of this kind
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            LogEntryKind::StdOut => "STDOUT",
            LogEntryKind::StdErr => "STDERR",
            LogEntryKind::NormalizedRecord => "NORMALIZED_ENTRY",
        }
    }
}

/// One unit of observed output
///
/// Decoded from `{"type": "STDOUT" | "STDERR" | "NORMALIZED_ENTRY", "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum LogEntry {
    /// Raw stdout line(s)
    #[serde(rename = "STDOUT")]
    StdOut(String),
    /// Raw stderr line(s)
    #[serde(rename = "STDERR")]
    StdErr(String),
    /// Normalized conversation record
    #[serde(rename = "NORMALIZED_ENTRY")]
    NormalizedRecord(Value),
}

impl LogEntry {
    /// Decode a materialized record
    ///
    /// # Errors
    /// Returns the serde error if the record is not a known entry shape
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Entry classification
    #[inline]
    #[must_use]
    pub fn kind(&self) -> LogEntryKind {
        match self {
            LogEntry::StdOut(_) => LogEntryKind::StdOut,
            LogEntry::StdErr(_) => LogEntryKind::StdErr,
            LogEntry::NormalizedRecord(_) => LogEntryKind::NormalizedRecord,
        }
    }

    /// Text content, for raw stream entries
    #[inline]
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            LogEntry::StdOut(text) | LogEntry::StdErr(text) => Some(text),
            LogEntry::NormalizedRecord(_) => None,
        }
    }

    /// Encode back to the materialized record shape
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Enum of String/Value payloads always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
