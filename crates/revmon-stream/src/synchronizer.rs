//! Patch stream synchronizer
//!
//! Maintains the locally materialized log of one observed subject:
//! - Opening a subject closes the previous subscription first
//! - Envelopes are applied atomically, in arrival order
//! - Consumers read the collection lazily and follow an ordered event stream
//!
//! Envelope application and `close()` are serialized by the per-subscription
//! state lock, so an envelope is either fully applied before a close or
//! discarded after it.

use crate::entry::LogEntry;
use crate::envelope::{PatchEnvelope, ENTRIES_POINTER};
use crate::error::StreamError;
use crate::projection::{project, ViewEntry};
use crate::transport::{EnvelopeReceiver, Transport};
use json_patch::Patch;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use ulid::Ulid;

/// Unique identifier of one opening of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub Ulid);

impl SubscriptionId {
    /// Generate new subscription ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the consumer should anchor the view after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollHint {
    /// First population of a previously empty view: jump to the end
    InitialLoad,
    /// Growth of already visible content: follow the end smoothly
    Append,
}

/// One delivered change of the materialized collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializedUpdate {
    /// Entry count after the update
    pub len: usize,
    /// Scroll anchoring hint
    pub hint: ScrollHint,
}

/// Notification delivered to the consumer of a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An envelope was applied
    Updated(MaterializedUpdate),
    /// An envelope was rejected; the collection is unchanged
    Corrupted(StreamError),
    /// The transport failed; the subscription is no longer live
    Failed(StreamError),
    /// The remote signalled completion
    Finished,
}

/// Result of handing one envelope to a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    Applied,
    Rejected,
    Failed,
    Ignored,
    Closed,
}

#[derive(Debug)]
struct SubscriptionState {
    document: Value,
    is_loading: bool,
    is_live: bool,
    closed: bool,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    pump: Option<JoinHandle<()>>,
}

impl SubscriptionState {
    fn entries(&self) -> &[Value] {
        self.document
            .pointer(ENTRIES_POINTER)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            // Receiver may have been dropped by the consumer; that is fine
            let _ = events.send(event);
        }
    }
}

#[derive(Debug)]
struct SubscriptionInner {
    id: SubscriptionId,
    subject: String,
    state: Mutex<SubscriptionState>,
    events: Mutex<Option<mpsc::UnboundedReceiver<SyncEvent>>>,
}

/// One active observation of a subject
///
/// Cheap to clone; all clones observe the same subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    inner: Arc<SubscriptionInner>,
}

impl SubscriptionHandle {
    pub(crate) fn new(subject: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SubscriptionInner {
                id: SubscriptionId::new(),
                subject,
                state: Mutex::new(SubscriptionState {
                    document: empty_document(),
                    is_loading: true,
                    is_live: true,
                    closed: false,
                    events: Some(tx),
                    pump: None,
                }),
                events: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Subject being observed
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    /// Identifier of this opening
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// True until the first envelope or terminal signal arrives
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    /// False once the stream finished, failed or was closed
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.state.lock().is_live
    }

    /// Check if `close()` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of materialized records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries().len()
    }

    /// Check if nothing is materialized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded entries, in materialized order
    ///
    /// Records that are not a known entry shape are skipped.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.view().into_iter().map(|view| view.entry).collect()
    }

    /// Keyed view of the materialized collection
    ///
    /// Classification happens here, on read, not when envelopes arrive.
    #[must_use]
    pub fn view(&self) -> Vec<ViewEntry> {
        let state = self.inner.state.lock();
        state
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match LogEntry::from_value(record) {
                Ok(entry) => Some(project(&self.inner.subject, index, &entry)),
                Err(e) => {
                    tracing::warn!(
                        subject = %self.inner.subject,
                        index,
                        error = %e,
                        "skipping unrecognized log record"
                    );
                    None
                }
            })
            .collect()
    }

    /// Take the ordered event stream of this subscription
    ///
    /// Only the first caller gets the receiver. The stream ends after `close()`.
    #[must_use]
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.inner.events.lock().take()
    }

    /// Tear down the transport and free the materialized state
    ///
    /// Idempotent, and safe on a finished or failed subscription.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }

        state.closed = true;
        state.is_live = false;
        state.is_loading = false;
        state.events = None;
        state.document = empty_document();
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }

        tracing::info!(subject = %self.inner.subject, id = %self.inner.id, "log subscription closed");
    }

    /// Start forwarding envelopes from `receiver`
    fn attach(&self, receiver: EnvelopeReceiver) {
        let weak = Arc::downgrade(&self.inner);
        let pump = tokio::spawn(pump_envelopes(weak, receiver));

        let mut state = self.inner.state.lock();
        if state.closed {
            pump.abort();
        } else {
            state.pump = Some(pump);
        }
    }

    /// Apply one envelope delivered by the transport
    pub(crate) fn on_envelope(&self, envelope: PatchEnvelope) -> ApplyOutcome {
        let subject = self.inner.subject.as_str();
        let mut state = self.inner.state.lock();

        if state.closed {
            tracing::debug!(subject, "dropping envelope for closed subscription");
            return ApplyOutcome::Closed;
        }
        if !state.is_live {
            tracing::warn!(subject, "unexpected envelope after stream ended");
            return ApplyOutcome::Ignored;
        }

        if let Some(error) = envelope.error {
            tracing::warn!(subject, %error, "log stream failed");
            state.is_live = false;
            state.is_loading = false;
            state.emit(SyncEvent::Failed(error));
            return ApplyOutcome::Failed;
        }

        let was_loading = state.is_loading;
        let previous_len = state.entries().len();
        let applied = apply_operations(subject, &state.document, &envelope.operations);
        let outcome = match applied {
            Ok(next) => {
                state.document = next;
                state.is_loading = false;
                if !envelope.operations.0.is_empty() || was_loading {
                    let hint = if previous_len == 0 {
                        ScrollHint::InitialLoad
                    } else {
                        ScrollHint::Append
                    };
                    let len = state.entries().len();
                    tracing::trace!(subject, len, ?hint, "envelope applied");
                    state.emit(SyncEvent::Updated(MaterializedUpdate { len, hint }));
                }
                ApplyOutcome::Applied
            }
            Err(error) => {
                tracing::warn!(subject, %error, "envelope rejected");
                state.emit(SyncEvent::Corrupted(error));
                ApplyOutcome::Rejected
            }
        };

        if envelope.is_final {
            tracing::info!(subject, "log stream finished");
            state.is_live = false;
            state.is_loading = false;
            state.emit(SyncEvent::Finished);
        }

        outcome
    }

    /// The transport dropped its side of the channel
    fn on_disconnect(&self) {
        let mut state = self.inner.state.lock();
        if state.closed || !state.is_live {
            return;
        }

        let error = StreamError::transport("stream closed before completion");
        tracing::warn!(subject = %self.inner.subject, %error, "log stream disconnected");
        state.is_live = false;
        state.is_loading = false;
        state.emit(SyncEvent::Failed(error));
    }
}

/// Forward envelopes until the transport ends or the subscription goes away
async fn pump_envelopes(inner: Weak<SubscriptionInner>, mut receiver: EnvelopeReceiver) {
    while let Some(envelope) = receiver.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let handle = SubscriptionHandle { inner };
        if handle.on_envelope(envelope) == ApplyOutcome::Closed {
            return;
        }
    }

    if let Some(inner) = inner.upgrade() {
        SubscriptionHandle { inner }.on_disconnect();
    }
}

/// Apply all operations to a copy of `document`
///
/// The copy is only returned when every operation succeeded and the entries
/// array is still in place.
fn apply_operations(subject: &str, document: &Value, operations: &Patch) -> Result<Value, StreamError> {
    let mut next = document.clone();

    for (index, operation) in operations.0.iter().enumerate() {
        let corruption = |reason: String| StreamError::EnvelopeCorruption {
            subject: subject.to_string(),
            operation: index,
            reason,
        };

        json_patch::patch(&mut next, std::slice::from_ref(operation))
            .map_err(|e| corruption(e.to_string()))?;

        if !next.pointer(ENTRIES_POINTER).is_some_and(Value::is_array) {
            return Err(corruption("entries is no longer an array".to_string()));
        }
    }

    Ok(next)
}

fn empty_document() -> Value {
    json!({ "entries": [] })
}

/// Log synchronizer for one consumer
///
/// Holds at most one live subscription; opening a new subject closes the
/// previous one before the transport is asked for the new channel.
#[derive(Debug)]
pub struct LogSynchronizer<T: Transport> {
    transport: Arc<T>,
    current: Mutex<Option<SubscriptionHandle>>,
}

impl<T: Transport> LogSynchronizer<T> {
    /// Create synchronizer over `transport`
    #[inline]
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            current: Mutex::new(None),
        }
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Observe `subject`
    ///
    /// # Errors
    /// Returns the transport's error if the channel cannot be opened; the
    /// previous subscription is closed regardless.
    pub async fn open(&self, subject: impl Into<String>) -> Result<SubscriptionHandle, StreamError> {
        let subject = subject.into();
        self.release();

        let receiver = self.transport.subscribe(&subject).await?;
        let handle = SubscriptionHandle::new(subject);
        handle.attach(receiver);

        tracing::info!(subject = %handle.subject(), id = %handle.id(), "log subscription opened");

        if let Some(previous) = self.current.lock().replace(handle.clone()) {
            previous.close();
        }
        Ok(handle)
    }

    /// Close the current subscription, if any
    pub fn release(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// Current subscription, if any
    #[must_use]
    pub fn current(&self) -> Option<SubscriptionHandle> {
        self.current.lock().clone()
    }

    /// Subject of the current subscription, if any
    #[must_use]
    pub fn current_subject(&self) -> Option<String> {
        self.current
            .lock()
            .as_ref()
            .map(|handle| handle.subject().to_string())
    }
}

impl<T: Transport> Drop for LogSynchronizer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.current.get_mut().take() {
            handle.close();
        }
    }
}
