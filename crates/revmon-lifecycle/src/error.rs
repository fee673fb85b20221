//! Error types for the review lifecycle
//!
//! - Configuration loading and validation failures
//! - Remote command failures (start / retry)
//! - Local rejections surfaced to the user as messages

use std::path::PathBuf;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for a review config
    #[error("invalid review config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Retry budget outside the supported range
    #[error("max_retries must be between 0 and {max}, got {value}")]
    MaxRetriesOutOfRange {
        /// Configured value
        value: u32,
        /// Largest accepted value
        max: u32,
    },
}

/// Remote command errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The request did not complete
    #[error("review request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but refused the command
    #[error("{message}")]
    Rejected {
        /// HTTP status, when known
        status: Option<u16>,
        /// Message for the user
        message: String,
    },
}

impl CommandError {
    /// Create rejection without HTTP status
    #[inline]
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.into(),
        }
    }
}

/// Review command errors kept as the local, user-visible message
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Start or retry command failed remotely
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Retry refused locally; no remote call was made
    #[error("Maximum retry limit ({max_retries}) reached")]
    RetryBudgetExceeded {
        /// Configured budget
        max_retries: u32,
    },
}
