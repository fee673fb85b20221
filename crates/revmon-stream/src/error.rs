//! Error types for the log stream
//!
//! Two failure families are surfaced to consumers:
//! - Transport failures (connection or frame decoding), recoverable only by reopening
//! - Envelope corruption (an operation did not fit the materialized document),
//!   which leaves the collection in its last good state

/// Log stream error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Connection or decode failure on the patch stream
    #[error("transport error: {0}")]
    Transport(String),

    /// An envelope could not be applied to the materialized document
    #[error("envelope rejected for {subject}: operation {operation} failed: {reason}")]
    EnvelopeCorruption {
        /// Subject whose envelope was rejected
        subject: String,
        /// Index of the failing operation within the envelope
        operation: usize,
        /// Human-readable cause
        reason: String,
    },

    /// The transport refused to open a subscription
    #[error("subscription to {subject} failed: {reason}")]
    SubscribeFailed {
        /// Subject that could not be opened
        subject: String,
        /// Human-readable cause
        reason: String,
    },
}

impl StreamError {
    /// Create transport error
    #[inline]
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    /// Check if the error ends the subscription
    ///
    /// Corruption only drops one envelope; the stream stays live.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::EnvelopeCorruption { .. })
    }
}
