//! Patch envelopes
//!
//! Provides [`PatchEnvelope`], the unit delivered by a transport: an ordered
//! batch of JSON Patch operations plus the stream control signals.
//!
//! Operations address a document of shape `{"entries": [...]}`; a log entry
//! lives at `/entries/<index>` and replacing `/entries` is a full resync.

use crate::error::StreamError;
use json_patch::Patch;
use serde::Deserialize;

/// Pointer of the entries array inside the materialized document
pub const ENTRIES_POINTER: &str = "/entries";

/// One inbound unit from the transport
///
/// # Invariants
/// - Envelopes for one subject are applied strictly in arrival order
/// - An envelope carrying `error` never has its operations applied
#[derive(Debug, Clone)]
pub struct PatchEnvelope {
    /// Ordered structural edits against the materialized document
    pub operations: Patch,
    /// No further envelopes will arrive for this subject
    pub is_final: bool,
    /// Transport or decoding failure
    pub error: Option<StreamError>,
}

impl PatchEnvelope {
    /// Envelope carrying operations only
    #[inline]
    #[must_use]
    pub fn patch(operations: Patch) -> Self {
        Self {
            operations,
            is_final: false,
            error: None,
        }
    }

    /// Last envelope of the stream, with its final operations
    #[inline]
    #[must_use]
    pub fn final_patch(operations: Patch) -> Self {
        Self {
            operations,
            is_final: true,
            error: None,
        }
    }

    /// Completion signal with no operations
    #[inline]
    #[must_use]
    pub fn finished() -> Self {
        Self::final_patch(Patch(Vec::new()))
    }

    /// Failure signal
    #[inline]
    #[must_use]
    pub fn failed(error: StreamError) -> Self {
        Self {
            operations: Patch(Vec::new()),
            is_final: false,
            error: Some(error),
        }
    }

    /// Number of operations carried
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.0.len()
    }

    /// Check if the envelope carries no operations
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.0.is_empty()
    }

    /// Decode one text frame of the log stream
    ///
    /// A frame is either `{"JsonPatch": [...]}` or `{"finished": true}`.
    /// Frames that do not decode produce a failed envelope rather than an
    /// error, so the synchronizer surfaces them through the normal path.
    #[must_use]
    pub fn from_wire(frame: &str) -> Self {
        match serde_json::from_str::<WireFrame>(frame) {
            Ok(WireFrame::JsonPatch(operations)) => Self::patch(operations),
            Ok(WireFrame::Finished(true)) => Self::finished(),
            Ok(WireFrame::Finished(false)) => Self::patch(Patch(Vec::new())),
            Err(e) => Self::failed(StreamError::transport(format!("undecodable frame: {e}"))),
        }
    }
}

/// Stream frame as sent by the log endpoint
#[derive(Debug, Deserialize)]
enum WireFrame {
    JsonPatch(Patch),
    #[serde(rename = "finished")]
    Finished(bool),
}
