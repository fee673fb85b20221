//! Review Monitor Lifecycle - review status derivation and commands
//!
//! Tracks the automated review of one task attempt:
//! - [`derive_status`]: pure reducer from execution records and local flags
//! - [`ReviewController`]: bound attempt, local state, start / retry / skip
//! - [`can_retry`]: retry budget guard
//! - [`ReviewCommands`]: the backend command seam, with an HTTP client
//! - [`ReviewConfig`]: explicit, TOML-loadable preferences
//!
//! # Example
//!
//! ```rust,ignore
//! use revmon_lifecycle::{HttpReviewCommands, ReviewConfig, ReviewController};
//!
//! # async fn example(records: Vec<revmon_lifecycle::ExecutionRecord>) {
//! let controller = ReviewController::new(
//!     ReviewConfig::default(),
//!     HttpReviewCommands::new("http://localhost:3000"),
//! );
//! controller.bind_subject(Some("attempt-1".to_string()));
//! controller.set_records(records);
//!
//! let snapshot = controller.snapshot();
//! if snapshot.can_retry {
//!     controller.retry_review().await;
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod commands;
pub mod config;
pub mod error;
pub mod machine;
pub mod retry;
pub mod types;

pub use commands::{HttpReviewCommands, ReviewCommands};
pub use config::{ReviewConfig, ReviewProfile};
pub use error::{CommandError, ConfigError, ReviewError};
pub use machine::{
    derive_status, review_prompt, should_show_logs, CommandOutcome, ReviewController,
    ReviewInputs, ReviewPrompt, ReviewSnapshot,
};
pub use retry::can_retry;
pub use types::{
    ActivityKind, ExecutionRecord, ExecutionStatus, FeedbackKind, FeedbackSeverity,
    ReviewExecutionState, ReviewFeedback, ReviewFeedbackItem, ReviewStatus,
    REVIEW_FAILED_MESSAGE,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for review lifecycle work
    pub use crate::{
        derive_status, CommandOutcome, ExecutionRecord, ReviewCommands, ReviewConfig,
        ReviewController, ReviewExecutionState, ReviewSnapshot, ReviewStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
