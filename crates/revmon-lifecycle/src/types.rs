//! Core types for the review lifecycle
//!
//! - Execution records as tracked by the backend (consumed, never mutated)
//! - Derived review status and execution state
//! - Review feedback produced by the review agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed message for a failed or killed review run
pub const REVIEW_FAILED_MESSAGE: &str = "Review failed";

/// Why an execution process was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Repository setup script
    SetupScript,
    /// Repository cleanup script
    CleanupScript,
    /// Coding agent turn
    CodingAgent,
    /// Development server
    DevServer,
    /// Review agent run
    Review,
    /// Any kind this client does not know
    #[serde(other)]
    Other,
}

/// Backend status of an execution process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Still executing
    Running,
    /// Exited successfully
    Completed,
    /// Exited with an error
    Failed,
    /// Stopped by the user or the system
    Killed,
    /// Any status this client does not know
    #[serde(other)]
    Unknown,
}

/// One backend-tracked run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Process id, also the log stream subject
    pub id: String,
    /// Activity classification
    #[serde(rename = "run_reason")]
    pub activity_kind: ActivityKind,
    /// Backend status
    pub status: ExecutionStatus,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Completion time, once finished
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Review summary, when the run produced one
    #[serde(default, rename = "review_summary")]
    pub summary: Option<String>,
}

impl ExecutionRecord {
    /// Check if this record belongs to the review activity
    #[inline]
    #[must_use]
    pub fn is_review(&self) -> bool {
        self.activity_kind == ActivityKind::Review
    }
}

/// Lifecycle status of the review of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// No review triggered yet
    #[default]
    None,
    /// Queued, not yet running; reserved, not produced by derivation
    Pending,
    /// Review agent executing
    Running,
    /// Review finished successfully
    Completed,
    /// Review failed or was killed
    Failed,
    /// User skipped the review
    Skipped,
}

impl ReviewStatus {
    /// Check if a review is in progress
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, ReviewStatus::Running | ReviewStatus::Pending)
    }

    /// Short label for status displays
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::None => "Not Started",
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Running => "Running",
            ReviewStatus::Completed => "Completed",
            ReviewStatus::Failed => "Failed",
            ReviewStatus::Skipped => "Skipped",
        }
    }
}

impl From<ExecutionStatus> for ReviewStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Running => ReviewStatus::Running,
            ExecutionStatus::Completed => ReviewStatus::Completed,
            ExecutionStatus::Failed | ExecutionStatus::Killed => ReviewStatus::Failed,
            ExecutionStatus::Unknown => ReviewStatus::None,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived review state; never persisted
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReviewExecutionState {
    /// Derived status
    pub status: ReviewStatus,
    /// Log stream subject of the selected record
    pub process_id: Option<String>,
    /// Start time of the selected record
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time of the selected record
    pub completed_at: Option<DateTime<Utc>>,
    /// Summary of the selected record
    pub summary: Option<String>,
    /// Review records beyond the first attempt
    pub retry_count: u32,
    /// Failure message of the selected record
    pub error_message: Option<String>,
}

/// Kind of a feedback item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    /// Proposed improvement
    Suggestion,
    /// Problem to fix
    Issue,
    /// Something done well
    Praise,
    /// Open question for the author
    Question,
}

/// Severity of a feedback item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSeverity {
    /// Informational
    Info,
    /// Should be looked at
    Warning,
    /// Must be fixed
    Error,
}

/// One feedback item from the review agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFeedbackItem {
    /// Item id
    pub id: String,
    /// Item kind
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    /// Severity
    pub severity: FeedbackSeverity,
    /// File the item refers to
    #[serde(default)]
    pub file_path: Option<String>,
    /// Line the item refers to
    #[serde(default)]
    pub line_number: Option<u32>,
    /// Headline
    pub title: String,
    /// Body
    pub description: String,
    /// Quoted code
    #[serde(default)]
    pub code_snippet: Option<String>,
}

impl ReviewFeedbackItem {
    /// `path:line` location, when the item points into a file
    #[must_use]
    pub fn location(&self) -> Option<String> {
        let path = self.file_path.as_deref()?;
        Some(match self.line_number {
            Some(line) => format!("{path}:{line}"),
            None => path.to_string(),
        })
    }
}

/// Complete feedback of one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFeedback {
    /// Attempt the review covered
    pub attempt_id: String,
    /// Individual items
    pub items: Vec<ReviewFeedbackItem>,
    /// Overall summary
    pub overall_summary: String,
    /// Quality score 0-100, when available
    #[serde(default)]
    pub score: Option<u8>,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl ReviewFeedback {
    /// Score at or above which a review counts as passing
    pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

    /// Check if the score reaches `threshold`; unscored feedback never passes
    #[inline]
    #[must_use]
    pub fn passes(&self, threshold: u8) -> bool {
        self.score.is_some_and(|score| score >= threshold)
    }

    /// Number of items at `severity`
    #[must_use]
    pub fn count_at(&self, severity: FeedbackSeverity) -> usize {
        self.items.iter().filter(|i| i.severity == severity).count()
    }
}
