//! Transport seam
//!
//! A transport opens one ordered, push-based channel of envelopes per subject.
//! Dropping the receiver tears the channel down.

use crate::envelope::PatchEnvelope;
use crate::error::StreamError;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;

/// Receiving side of one subject's envelope channel
pub type EnvelopeReceiver = mpsc::Receiver<PatchEnvelope>;

/// Ordered envelope source keyed by subject id
///
/// Implementations must deliver envelopes in origination order, at most once,
/// and end the stream with either a final envelope or a failed one.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the envelope channel for `subject`
    ///
    /// # Errors
    /// Returns [`StreamError::SubscribeFailed`] if the channel cannot be established
    async fn subscribe(&self, subject: &str) -> Result<EnvelopeReceiver, StreamError>;
}

/// In-process transport
///
/// Each subscription gets its own bounded channel; producers push envelopes
/// by subject. Used for replaying recorded streams and in tests.
#[derive(Debug)]
pub struct ChannelTransport {
    capacity: usize,
    senders: DashMap<String, mpsc::Sender<PatchEnvelope>>,
    unavailable: DashSet<String>,
}

impl ChannelTransport {
    /// Create transport with per-subscription buffer capacity
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: DashMap::new(),
            unavailable: DashSet::new(),
        }
    }

    /// Make subsequent subscriptions to `subject` fail
    pub fn set_unavailable(&self, subject: impl Into<String>) {
        self.unavailable.insert(subject.into());
    }

    /// Deliver an envelope to the subscriber of `subject`
    ///
    /// Returns `false` if nobody is listening; the envelope is dropped.
    pub async fn push(&self, subject: &str, envelope: PatchEnvelope) -> bool {
        // Clone out so the map shard is not held across the await
        let Some(sender) = self.senders.get(subject).map(|s| s.value().clone()) else {
            return false;
        };

        if sender.send(envelope).await.is_ok() {
            true
        } else {
            self.senders
                .remove_if(subject, |_, current| current.same_channel(&sender));
            false
        }
    }

    /// Signal completion for `subject`
    pub async fn finish(&self, subject: &str) -> bool {
        self.push(subject, PatchEnvelope::finished()).await
    }

    /// Signal an unrecoverable failure for `subject`
    pub async fn fail(&self, subject: &str, reason: impl Into<String>) -> bool {
        self.push(subject, PatchEnvelope::failed(StreamError::transport(reason)))
            .await
    }

    /// Drop the producing side for `subject` without a completion signal
    pub fn disconnect(&self, subject: &str) {
        self.senders.remove(subject);
    }

    /// Check if `subject` has a listening subscriber
    #[must_use]
    pub fn is_subscribed(&self, subject: &str) -> bool {
        self.senders
            .get(subject)
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Number of registered subject channels, live or not yet pruned
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.senders.len()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn subscribe(&self, subject: &str) -> Result<EnvelopeReceiver, StreamError> {
        if self.unavailable.contains(subject) {
            return Err(StreamError::SubscribeFailed {
                subject: subject.to_string(),
                reason: "subject unavailable".to_string(),
            });
        }

        // drop channels whose subscriber went away
        self.senders.retain(|_, sender| !sender.is_closed());

        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.insert(subject.to_string(), tx);
        tracing::debug!(subject, "channel transport subscribed");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_without_subscriber_is_dropped() {
        let transport = ChannelTransport::default();
        assert!(!transport.push("exec-1", PatchEnvelope::finished()).await);
    }

    #[tokio::test]
    async fn push_reaches_subscriber_in_order() {
        let transport = ChannelTransport::new(4);
        let mut rx = transport.subscribe("exec-1").await.unwrap();

        assert!(transport.fail("exec-1", "first").await);
        assert!(transport.finish("exec-1").await);

        let first = rx.recv().await.unwrap();
        assert!(first.error.is_some());
        let second = rx.recv().await.unwrap();
        assert!(second.is_final);
    }

    #[tokio::test]
    async fn dropped_receiver_unsubscribes() {
        let transport = ChannelTransport::default();
        let rx = transport.subscribe("exec-1").await.unwrap();
        assert!(transport.is_subscribed("exec-1"));

        drop(rx);
        assert!(!transport.is_subscribed("exec-1"));
        assert!(!transport.finish("exec-1").await);
    }

    #[tokio::test]
    async fn released_channels_are_pruned_on_subscribe() {
        let transport = ChannelTransport::default();
        for index in 0..10 {
            let rx = transport.subscribe(&format!("exec-{index}")).await.unwrap();
            drop(rx);
        }
        let _live = transport.subscribe("exec-live").await.unwrap();

        assert_eq!(transport.channel_count(), 1);
        assert!(transport.is_subscribed("exec-live"));
    }

    #[tokio::test]
    async fn unavailable_subject_refuses_subscription() {
        let transport = ChannelTransport::default();
        transport.set_unavailable("exec-9");

        let result = transport.subscribe("exec-9").await;
        assert!(matches!(result, Err(StreamError::SubscribeFailed { .. })));
    }
}
