//! Review monitor
//!
//! Binds the derived review state of one attempt to a live log subscription.
//! After every input change the subscription is reconciled: the review
//! process is observed while its logs are worth showing, and released
//! otherwise.

use crate::error::MonitorError;
use revmon_lifecycle::{
    should_show_logs, CommandOutcome, ExecutionRecord, ReviewCommands, ReviewConfig,
    ReviewController, ReviewFeedback, ReviewSnapshot,
};
use revmon_stream::{LogSynchronizer, SubscriptionHandle, Transport};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Review state plus log subscription for one bound attempt
pub struct ReviewMonitor<T: Transport, C: ReviewCommands> {
    controller: ReviewController<C>,
    logs: LogSynchronizer<T>,
    // serializes reconciliation across the async open
    reconcile: Mutex<()>,
}

impl<T: Transport, C: ReviewCommands> ReviewMonitor<T, C> {
    /// Create monitor
    #[must_use]
    pub fn new(config: ReviewConfig, transport: Arc<T>, commands: C) -> Self {
        Self {
            controller: ReviewController::new(config, commands),
            logs: LogSynchronizer::new(transport),
            reconcile: Mutex::new(()),
        }
    }

    /// Get review controller
    #[inline]
    #[must_use]
    pub fn controller(&self) -> &ReviewController<C> {
        &self.controller
    }

    /// Get log synchronizer
    #[inline]
    #[must_use]
    pub fn synchronizer(&self) -> &LogSynchronizer<T> {
        &self.logs
    }

    /// Bind an attempt, or unbind with `None`
    ///
    /// # Errors
    /// Returns `MonitorError::Stream` if a needed log subscription cannot be opened
    pub async fn bind_attempt(&self, attempt_id: Option<String>) -> Result<(), MonitorError> {
        if self.controller.bind_subject(attempt_id) {
            self.logs.release();
        }
        self.sync_logs().await
    }

    /// Replace the execution records of the bound attempt
    ///
    /// # Errors
    /// Returns `MonitorError::Stream` if a needed log subscription cannot be opened
    pub async fn update_records(&self, records: Vec<ExecutionRecord>) -> Result<(), MonitorError> {
        self.controller.set_records(records);
        self.sync_logs().await
    }

    /// Start a review of the bound attempt
    ///
    /// # Errors
    /// Returns `MonitorError::Stream` if a needed log subscription cannot be opened
    pub async fn start_review(&self) -> Result<CommandOutcome, MonitorError> {
        let outcome = self.controller.start_review().await;
        self.sync_logs().await?;
        Ok(outcome)
    }

    /// Retry the failed review of the bound attempt
    ///
    /// # Errors
    /// Returns `MonitorError::Stream` if a needed log subscription cannot be opened
    pub async fn retry_review(&self) -> Result<CommandOutcome, MonitorError> {
        let outcome = self.controller.retry_review().await;
        self.sync_logs().await?;
        Ok(outcome)
    }

    /// Skip the review; releases its log subscription
    ///
    /// # Errors
    /// Returns `MonitorError::Stream` if a needed log subscription cannot be opened
    pub async fn skip_review(&self) -> Result<(), MonitorError> {
        self.controller.skip_review();
        self.sync_logs().await
    }

    /// Cache review feedback for the bound attempt
    pub fn set_feedback(&self, feedback: ReviewFeedback) {
        self.controller.set_feedback(feedback);
    }

    /// Snapshot review state
    #[must_use]
    pub fn snapshot(&self) -> ReviewSnapshot {
        self.controller.snapshot()
    }

    /// Current log subscription, if logs are shown
    #[must_use]
    pub fn logs(&self) -> Option<SubscriptionHandle> {
        self.logs.current()
    }

    async fn sync_logs(&self) -> Result<(), MonitorError> {
        let _guard = self.reconcile.lock().await;

        let execution = self.controller.execution();
        let wanted = if should_show_logs(&execution) {
            execution.process_id
        } else {
            None
        };

        match wanted {
            Some(process_id) => {
                if self.logs.current_subject().as_deref() != Some(process_id.as_str()) {
                    tracing::info!(%process_id, status = %execution.status, "following review logs");
                    self.logs.open(process_id).await?;
                }
            }
            None => {
                if let Some(subject) = self.logs.current_subject() {
                    tracing::debug!(%subject, status = %execution.status, "releasing review logs");
                    self.logs.release();
                }
            }
        }
        Ok(())
    }
}

/// Feed record snapshots from `records` into `monitor` until the sender drops
pub fn watch_records<T, C>(
    monitor: Arc<ReviewMonitor<T, C>>,
    mut records: watch::Receiver<Vec<ExecutionRecord>>,
) -> JoinHandle<()>
where
    T: Transport,
    C: ReviewCommands + 'static,
{
    tokio::spawn(async move {
        loop {
            let snapshot = records.borrow_and_update().clone();
            if let Err(err) = monitor.update_records(snapshot).await {
                tracing::warn!(error = %err, "review log subscription failed");
            }
            if records.changed().await.is_err() {
                break;
            }
        }
        tracing::debug!("record source closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use revmon_lifecycle::{
        ActivityKind, CommandError, ExecutionStatus, ReviewStatus,
    };
    use revmon_stream::ChannelTransport;

    struct AcceptAll;

    #[async_trait]
    impl ReviewCommands for AcceptAll {
        async fn request_start(&self, _attempt_id: &str) -> Result<(), CommandError> {
            Ok(())
        }

        async fn request_retry(&self, _attempt_id: &str) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn review(id: &str, status: ExecutionStatus) -> ExecutionRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "run_reason": "review",
            "status": status,
            "started_at": "2026-03-01T09:00:00Z"
        }))
        .unwrap()
    }

    fn monitor() -> ReviewMonitor<ChannelTransport, AcceptAll> {
        ReviewMonitor::new(ReviewConfig::new(), Arc::new(ChannelTransport::default()), AcceptAll)
    }

    #[tokio::test]
    async fn running_review_opens_logs() {
        let monitor = monitor();
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();
        assert!(monitor.logs().is_none());

        monitor
            .update_records(vec![review("r1", ExecutionStatus::Running)])
            .await
            .unwrap();

        let logs = monitor.logs().unwrap();
        assert_eq!(logs.subject(), "r1");
        assert!(monitor.synchronizer().transport().is_subscribed("r1"));
    }

    #[tokio::test]
    async fn same_process_keeps_subscription() {
        let monitor = monitor();
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();
        monitor
            .update_records(vec![review("r1", ExecutionStatus::Running)])
            .await
            .unwrap();
        let first = monitor.logs().unwrap().id();

        monitor
            .update_records(vec![review("r1", ExecutionStatus::Completed)])
            .await
            .unwrap();
        assert_eq!(monitor.logs().unwrap().id(), first);
    }

    #[tokio::test]
    async fn skip_releases_logs() {
        let monitor = monitor();
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();
        monitor
            .update_records(vec![review("r1", ExecutionStatus::Running)])
            .await
            .unwrap();
        let handle = monitor.logs().unwrap();

        monitor.skip_review().await.unwrap();

        assert_eq!(monitor.snapshot().execution.status, ReviewStatus::Skipped);
        assert!(monitor.logs().is_none());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn other_activity_never_opens_logs() {
        let monitor = monitor();
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();
        let mut record = review("c1", ExecutionStatus::Running);
        record.activity_kind = ActivityKind::CodingAgent;

        monitor.update_records(vec![record]).await.unwrap();
        assert!(monitor.logs().is_none());
    }

    #[tokio::test]
    async fn failed_open_is_reported() {
        let transport = Arc::new(ChannelTransport::default());
        transport.set_unavailable("r1");
        let monitor = ReviewMonitor::new(ReviewConfig::new(), transport, AcceptAll);
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();

        let result = monitor
            .update_records(vec![review("r1", ExecutionStatus::Running)])
            .await;
        assert!(matches!(result, Err(MonitorError::Stream(_))));
        assert_eq!(monitor.snapshot().execution.status, ReviewStatus::Running);
    }

    #[tokio::test]
    async fn watch_feeds_records() {
        let monitor = Arc::new(monitor());
        monitor.bind_attempt(Some("att-1".to_string())).await.unwrap();
        let (tx, rx) = watch::channel(Vec::new());
        let task = watch_records(Arc::clone(&monitor), rx);

        tx.send(vec![review("r1", ExecutionStatus::Failed)]).unwrap();
        drop(tx);
        task.await.unwrap();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.execution.status, ReviewStatus::Failed);
        assert!(snapshot.can_retry);
        assert_eq!(monitor.logs().unwrap().subject(), "r1");
    }
}
