//! Review lifecycle state machine
//!
//! Status is never stored. It is recomputed from an explicit input set by
//! [`derive_status`], a pure reducer. [`ReviewController`] owns the inputs
//! for one bound attempt and issues start / retry commands:
//! - the backend record list is the single source of truth for attempts
//! - local state covers skip, in-flight command, error message and feedback
//! - changing the bound attempt resets all local state and records

use crate::commands::ReviewCommands;
use crate::config::ReviewConfig;
use crate::error::{CommandError, ReviewError};
use crate::retry::can_retry;
use crate::types::{
    ExecutionRecord, ExecutionStatus, ReviewExecutionState, ReviewFeedback, ReviewStatus,
    REVIEW_FAILED_MESSAGE,
};
use parking_lot::Mutex;
use serde::Serialize;

/// Inputs of one status derivation
#[derive(Debug, Clone, Copy)]
pub struct ReviewInputs<'a> {
    /// Execution records of the attempt, in arrival order
    pub records: &'a [ExecutionRecord],
    /// Local skip override
    pub skipped: bool,
    /// A start or retry command is in flight
    pub starting: bool,
    /// Retry budget
    pub max_retries: u32,
}

/// Derive the review state from its inputs
///
/// Skip wins over any record. Otherwise the last review record decides.
/// `retry_count` always counts every review record past the first.
#[must_use]
pub fn derive_status(inputs: &ReviewInputs<'_>) -> ReviewExecutionState {
    let reviews: Vec<&ExecutionRecord> = inputs.records.iter().filter(|r| r.is_review()).collect();
    let retry_count = u32::try_from(reviews.len().saturating_sub(1)).unwrap_or(u32::MAX);

    if inputs.skipped {
        return ReviewExecutionState {
            status: ReviewStatus::Skipped,
            retry_count,
            ..ReviewExecutionState::default()
        };
    }

    let Some(latest) = reviews.last() else {
        return ReviewExecutionState::default();
    };

    let status = ReviewStatus::from(latest.status);
    if status == ReviewStatus::None {
        return ReviewExecutionState {
            retry_count,
            ..ReviewExecutionState::default()
        };
    }

    let error_message = matches!(
        latest.status,
        ExecutionStatus::Failed | ExecutionStatus::Killed
    )
    .then(|| REVIEW_FAILED_MESSAGE.to_string());

    ReviewExecutionState {
        status,
        process_id: Some(latest.id.clone()),
        started_at: Some(latest.started_at),
        completed_at: latest.completed_at,
        summary: latest.summary.clone(),
        retry_count,
        error_message,
    }
}

/// Check if the review log stream should be observed
#[inline]
#[must_use]
pub fn should_show_logs(state: &ReviewExecutionState) -> bool {
    state.process_id.is_some()
        && matches!(
            state.status,
            ReviewStatus::Running | ReviewStatus::Completed | ReviewStatus::Failed
        )
}

/// Call to action for a task waiting in review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewPrompt {
    /// Auto review is on; the backend will start one
    AutoReviewPending,
    /// Auto review is off; suggest starting one manually
    StartSuggested,
}

/// Prompt to show for a task, if any
#[must_use]
pub fn review_prompt(
    task_in_review: bool,
    status: ReviewStatus,
    config: &ReviewConfig,
) -> Option<ReviewPrompt> {
    if !task_in_review || status != ReviewStatus::None {
        return None;
    }
    Some(if config.auto_review_enabled {
        ReviewPrompt::AutoReviewPending
    } else {
        ReviewPrompt::StartSuggested
    })
}

/// Result of a start or retry command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Backend accepted the command
    Sent,
    /// Preconditions not met; nothing happened
    Ignored,
    /// Retry budget exhausted; no remote call made
    BudgetExceeded,
    /// Backend call failed; message stored in local state
    Failed,
}

/// Everything a view needs for one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSnapshot {
    /// Derived state
    pub execution: ReviewExecutionState,
    /// A command is in flight
    pub is_starting: bool,
    /// Derived status is running or pending
    pub is_running: bool,
    /// A retry would be accepted
    pub can_retry: bool,
    /// Last local error message
    pub error: Option<String>,
    /// Cached review feedback
    pub feedback: Option<ReviewFeedback>,
}

#[derive(Debug, Default)]
struct LocalState {
    skipped: bool,
    starting: bool,
    error: Option<String>,
    feedback: Option<ReviewFeedback>,
}

#[derive(Debug, Default)]
struct ControllerState {
    subject: Option<String>,
    // bumped on every subject change
    generation: u64,
    records: Vec<ExecutionRecord>,
    local: LocalState,
}

impl ControllerState {
    fn derive(&self, max_retries: u32) -> ReviewExecutionState {
        derive_status(&ReviewInputs {
            records: &self.records,
            skipped: self.local.skipped,
            starting: self.local.starting,
            max_retries,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum CommandKind {
    Start,
    Retry,
}

impl CommandKind {
    fn name(self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Retry => "retry",
        }
    }
}

/// Review state machine for one bound attempt at a time
#[derive(Debug)]
pub struct ReviewController<C: ReviewCommands> {
    config: ReviewConfig,
    commands: C,
    state: Mutex<ControllerState>,
}

impl<C: ReviewCommands> ReviewController<C> {
    /// Create controller with explicit configuration
    #[must_use]
    pub fn new(config: ReviewConfig, commands: C) -> Self {
        Self {
            config,
            commands,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Get command client
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &C {
        &self.commands
    }

    /// Get bound attempt
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.state.lock().subject.clone()
    }

    /// Bind an attempt, resetting local state and records on change
    ///
    /// Returns `true` if the bound attempt changed.
    pub fn bind_subject(&self, subject: Option<String>) -> bool {
        let mut state = self.state.lock();
        if state.subject == subject {
            return false;
        }
        tracing::info!(from = ?state.subject, to = ?subject, "review subject changed");
        state.subject = subject;
        state.generation += 1;
        state.records.clear();
        state.local = LocalState::default();
        true
    }

    /// Replace the records snapshot of the bound attempt
    pub fn set_records(&self, records: Vec<ExecutionRecord>) {
        let mut state = self.state.lock();
        state.records = records;
    }

    /// Derive the current state
    #[must_use]
    pub fn execution(&self) -> ReviewExecutionState {
        self.state.lock().derive(self.config.max_retries)
    }

    /// Ask the backend to start a review
    ///
    /// Ignored without a bound attempt, while a review runs, or while
    /// another command is in flight.
    pub async fn start_review(&self) -> CommandOutcome {
        let (subject, generation) = {
            let mut state = self.state.lock();
            let Some(subject) = state.subject.clone() else {
                tracing::debug!("start ignored: no attempt bound");
                return CommandOutcome::Ignored;
            };
            if state.local.starting || state.derive(self.config.max_retries).status.is_running() {
                tracing::debug!(%subject, "start ignored: review busy");
                return CommandOutcome::Ignored;
            }
            state.local.starting = true;
            state.local.skipped = false;
            state.local.error = None;
            (subject, state.generation)
        };

        tracing::info!(%subject, "starting review");
        let result = self.commands.request_start(&subject).await;
        self.complete(generation, CommandKind::Start, &subject, result)
    }

    /// Ask the backend to retry a failed review
    ///
    /// Refused locally once the retry budget is spent.
    pub async fn retry_review(&self) -> CommandOutcome {
        let max_retries = self.config.max_retries;
        let (subject, generation) = {
            let mut state = self.state.lock();
            let Some(subject) = state.subject.clone() else {
                tracing::debug!("retry ignored: no attempt bound");
                return CommandOutcome::Ignored;
            };
            let execution = state.derive(max_retries);
            if state.local.starting || execution.status != ReviewStatus::Failed {
                tracing::debug!(%subject, status = %execution.status, "retry ignored");
                return CommandOutcome::Ignored;
            }
            if !can_retry(execution.status, execution.retry_count, max_retries) {
                let err = ReviewError::RetryBudgetExceeded { max_retries };
                tracing::warn!(%subject, retry_count = execution.retry_count, "{err}");
                state.local.error = Some(err.to_string());
                return CommandOutcome::BudgetExceeded;
            }
            state.local.starting = true;
            state.local.error = None;
            (subject, state.generation)
        };

        tracing::info!(%subject, "retrying review");
        let result = self.commands.request_retry(&subject).await;
        self.complete(generation, CommandKind::Retry, &subject, result)
    }

    fn complete(
        &self,
        generation: u64,
        kind: CommandKind,
        subject: &str,
        result: Result<(), CommandError>,
    ) -> CommandOutcome {
        let mut state = self.state.lock();
        let current = state.generation == generation;
        if current {
            state.local.starting = false;
        }

        match result {
            Ok(()) => CommandOutcome::Sent,
            Err(err) => {
                let err = ReviewError::from(err);
                tracing::warn!(%subject, command = kind.name(), error = %err, "review command failed");
                if current {
                    state.local.error = Some(err.to_string());
                }
                CommandOutcome::Failed
            }
        }
    }

    /// Skip the review of the bound attempt
    pub fn skip_review(&self) {
        let mut state = self.state.lock();
        tracing::info!(subject = ?state.subject, "review skipped");
        state.local.skipped = true;
        state.local.error = None;
    }

    /// Cache review feedback for the bound attempt
    pub fn set_feedback(&self, feedback: ReviewFeedback) {
        self.state.lock().local.feedback = Some(feedback);
    }

    /// Drop cached review feedback
    pub fn clear_feedback(&self) {
        self.state.lock().local.feedback = None;
    }

    /// Snapshot derived and local state
    #[must_use]
    pub fn snapshot(&self) -> ReviewSnapshot {
        let state = self.state.lock();
        let execution = state.derive(self.config.max_retries);
        ReviewSnapshot {
            is_starting: state.local.starting,
            is_running: execution.status.is_running(),
            can_retry: can_retry(execution.status, execution.retry_count, self.config.max_retries),
            error: state.local.error.clone(),
            feedback: state.local.feedback.clone(),
            execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MockReviewCommands;
    use crate::types::ActivityKind;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn record(id: &str, kind: ActivityKind, status: ExecutionStatus) -> ExecutionRecord {
        ExecutionRecord {
            id: id.to_string(),
            activity_kind: kind,
            status,
            started_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            completed_at: None,
            summary: None,
        }
    }

    fn review(id: &str, status: ExecutionStatus) -> ExecutionRecord {
        record(id, ActivityKind::Review, status)
    }

    fn derive(records: &[ExecutionRecord], skipped: bool) -> ReviewExecutionState {
        derive_status(&ReviewInputs {
            records,
            skipped,
            starting: false,
            max_retries: 3,
        })
    }

    fn controller(mock: MockReviewCommands, max_retries: u32) -> ReviewController<MockReviewCommands> {
        ReviewController::new(ReviewConfig::new().with_max_retries(max_retries), mock)
    }

    #[test]
    fn no_review_records_is_none() {
        let records = [record("p1", ActivityKind::CodingAgent, ExecutionStatus::Completed)];
        let state = derive(&records, false);
        assert_eq!(state, ReviewExecutionState::default());
    }

    #[test]
    fn running_review() {
        let state = derive(&[review("r1", ExecutionStatus::Running)], false);
        assert_eq!(state.status, ReviewStatus::Running);
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.process_id.as_deref(), Some("r1"));
        assert!(!can_retry(state.status, state.retry_count, 3));
        assert!(should_show_logs(&state));
    }

    #[test]
    fn retry_count_tracks_failed_attempts() {
        let mut records = vec![
            review("r1", ExecutionStatus::Failed),
            review("r2", ExecutionStatus::Failed),
        ];
        let state = derive(&records, false);
        assert_eq!(state.status, ReviewStatus::Failed);
        assert_eq!(state.retry_count, 1);
        assert!(can_retry(state.status, state.retry_count, 3));

        records.push(review("r3", ExecutionStatus::Failed));
        let state = derive(&records, false);
        assert_eq!(state.retry_count, 2);
        assert!(can_retry(state.status, state.retry_count, 3));

        records.push(review("r4", ExecutionStatus::Failed));
        let state = derive(&records, false);
        assert_eq!(state.retry_count, 3);
        assert!(!can_retry(state.status, state.retry_count, 3));
    }

    #[test]
    fn skip_overrides_running() {
        let state = derive(&[review("r1", ExecutionStatus::Running)], true);
        assert_eq!(state.status, ReviewStatus::Skipped);
        assert_eq!(state.retry_count, 0);
        assert!(state.process_id.is_none());
        assert!(state.completed_at.is_none());
        assert!(!should_show_logs(&state));
    }

    #[test]
    fn skip_keeps_historical_retry_count() {
        let records = [
            review("r1", ExecutionStatus::Failed),
            review("r2", ExecutionStatus::Failed),
            review("r3", ExecutionStatus::Failed),
        ];
        assert_eq!(derive(&records, true).retry_count, 2);
    }

    #[test]
    fn killed_maps_to_failed_with_message() {
        let state = derive(&[review("r1", ExecutionStatus::Killed)], false);
        assert_eq!(state.status, ReviewStatus::Failed);
        assert_eq!(state.error_message.as_deref(), Some(REVIEW_FAILED_MESSAGE));
    }

    #[test]
    fn latest_review_wins_regardless_of_other_kinds() {
        let records = [
            review("r1", ExecutionStatus::Failed),
            record("c1", ActivityKind::CodingAgent, ExecutionStatus::Running),
            review("r2", ExecutionStatus::Completed),
            record("d1", ActivityKind::DevServer, ExecutionStatus::Running),
        ];
        let state = derive(&records, false);
        assert_eq!(state.status, ReviewStatus::Completed);
        assert_eq!(state.process_id.as_deref(), Some("r2"));
        assert!(state.error_message.is_none());
        assert_eq!(state.retry_count, 1);
    }

    #[test]
    fn unknown_status_derives_none() {
        let state = derive(&[review("r1", ExecutionStatus::Unknown)], false);
        assert_eq!(state.status, ReviewStatus::None);
        assert!(!should_show_logs(&state));
    }

    #[test]
    fn prompt_only_for_unstarted_review() {
        let manual = ReviewConfig::new();
        let auto = ReviewConfig::new().with_auto_review(true);
        assert_eq!(
            review_prompt(true, ReviewStatus::None, &manual),
            Some(ReviewPrompt::StartSuggested)
        );
        assert_eq!(
            review_prompt(true, ReviewStatus::None, &auto),
            Some(ReviewPrompt::AutoReviewPending)
        );
        assert_eq!(review_prompt(false, ReviewStatus::None, &auto), None);
        assert_eq!(review_prompt(true, ReviewStatus::Running, &manual), None);
    }

    #[tokio::test]
    async fn start_without_subject_is_ignored() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_start().never();
        let controller = controller(mock, 3);

        assert_eq!(controller.start_review().await, CommandOutcome::Ignored);
    }

    #[tokio::test]
    async fn start_while_running_is_ignored() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_start().never();
        let controller = controller(mock, 3);
        controller.bind_subject(Some("att-1".to_string()));
        controller.set_records(vec![review("r1", ExecutionStatus::Running)]);

        assert_eq!(controller.start_review().await, CommandOutcome::Ignored);
    }

    #[tokio::test]
    async fn start_clears_skip_and_error() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_start()
            .withf(|attempt_id| attempt_id == "att-1")
            .times(1)
            .returning(|_| Ok(()));
        let controller = controller(mock, 3);
        controller.bind_subject(Some("att-1".to_string()));
        controller.skip_review();
        assert_eq!(controller.snapshot().execution.status, ReviewStatus::Skipped);

        assert_eq!(controller.start_review().await, CommandOutcome::Sent);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.execution.status, ReviewStatus::None);
        assert!(!snapshot.is_starting);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn start_failure_sets_error_without_status_change() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_start()
            .times(1)
            .returning(|_| Err(CommandError::rejected("Attempt has no worktree")));
        let controller = controller(mock, 3);
        controller.bind_subject(Some("att-1".to_string()));

        assert_eq!(controller.start_review().await, CommandOutcome::Failed);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("Attempt has no worktree"));
        assert_eq!(snapshot.execution.status, ReviewStatus::None);
        assert!(!snapshot.is_starting);
    }

    #[tokio::test]
    async fn retry_over_budget_makes_no_call() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_retry().never();
        let controller = controller(mock, 1);
        controller.bind_subject(Some("att-1".to_string()));
        controller.set_records(vec![
            review("r1", ExecutionStatus::Failed),
            review("r2", ExecutionStatus::Failed),
        ]);

        assert_eq!(controller.retry_review().await, CommandOutcome::BudgetExceeded);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("Maximum retry limit (1) reached"));
        assert!(!snapshot.can_retry);
    }

    #[tokio::test]
    async fn retry_requires_failed_status() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_retry().never();
        let controller = controller(mock, 3);
        controller.bind_subject(Some("att-1".to_string()));
        controller.set_records(vec![review("r1", ExecutionStatus::Completed)]);

        assert_eq!(controller.retry_review().await, CommandOutcome::Ignored);
    }

    #[tokio::test]
    async fn retry_within_budget_is_sent() {
        let mut mock = MockReviewCommands::new();
        mock.expect_request_retry()
            .withf(|attempt_id| attempt_id == "att-1")
            .times(1)
            .returning(|_| Ok(()));
        let controller = controller(mock, 3);
        controller.bind_subject(Some("att-1".to_string()));
        controller.set_records(vec![review("r1", ExecutionStatus::Failed)]);
        assert!(controller.snapshot().can_retry);

        assert_eq!(controller.retry_review().await, CommandOutcome::Sent);
    }

    #[test]
    fn subject_switch_resets_local_state() {
        let controller = controller(MockReviewCommands::new(), 3);
        controller.bind_subject(Some("att-a".to_string()));
        controller.set_records(vec![
            review("r1", ExecutionStatus::Failed),
            review("r2", ExecutionStatus::Failed),
        ]);
        controller.skip_review();
        controller.set_feedback(ReviewFeedback {
            attempt_id: "att-a".to_string(),
            items: Vec::new(),
            overall_summary: "ok".to_string(),
            score: Some(90),
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        });

        assert!(controller.bind_subject(Some("att-b".to_string())));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.execution, ReviewExecutionState::default());
        assert!(snapshot.error.is_none());
        assert!(snapshot.feedback.is_none());
        assert!(!snapshot.is_starting);
    }

    #[test]
    fn rebinding_same_subject_keeps_state() {
        let controller = controller(MockReviewCommands::new(), 3);
        controller.bind_subject(Some("att-a".to_string()));
        controller.skip_review();

        assert!(!controller.bind_subject(Some("att-a".to_string())));
        assert_eq!(controller.snapshot().execution.status, ReviewStatus::Skipped);
    }

    #[test]
    fn feedback_can_be_cleared() {
        let controller = controller(MockReviewCommands::new(), 3);
        controller.set_feedback(ReviewFeedback {
            attempt_id: "att-a".to_string(),
            items: Vec::new(),
            overall_summary: "fine".to_string(),
            score: None,
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        });
        assert!(controller.snapshot().feedback.is_some());

        controller.clear_feedback();
        assert!(controller.snapshot().feedback.is_none());
    }

    struct GatedCommands {
        gate: Arc<Notify>,
        entered: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl ReviewCommands for GatedCommands {
        async fn request_start(&self, _attempt_id: &str) -> Result<(), CommandError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Err(CommandError::rejected("late failure"))
        }

        async fn request_retry(&self, _attempt_id: &str) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn in_flight_command_blocks_second_and_late_result_is_dropped() {
        let gate = Arc::new(Notify::new());
        let entered = Arc::new(Notify::new());
        let controller = Arc::new(ReviewController::new(
            ReviewConfig::new(),
            GatedCommands {
                gate: Arc::clone(&gate),
                entered: Arc::clone(&entered),
            },
        ));
        controller.bind_subject(Some("att-a".to_string()));

        let pending = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.start_review().await }
        });
        entered.notified().await;

        assert!(controller.snapshot().is_starting);
        assert_eq!(controller.start_review().await, CommandOutcome::Ignored);

        controller.bind_subject(Some("att-b".to_string()));
        gate.notify_one();
        assert_eq!(pending.await.unwrap(), CommandOutcome::Failed);

        let snapshot = controller.snapshot();
        assert!(snapshot.error.is_none());
        assert!(!snapshot.is_starting);
    }
}
