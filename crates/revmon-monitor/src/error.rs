//! Monitor errors

use std::path::PathBuf;

/// Errors from the monitor and its input files
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Log subscription could not be opened
    #[error(transparent)]
    Stream(#[from] revmon_stream::StreamError),

    /// Review configuration is unusable
    #[error(transparent)]
    Config(#[from] revmon_lifecycle::ConfigError),

    /// Input file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Records file is not a list of execution records
    #[error("invalid records in {path}: {source}")]
    Records {
        /// File that was parsed
        path: PathBuf,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },
}
