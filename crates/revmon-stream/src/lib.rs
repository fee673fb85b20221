//! Review Monitor Stream - incremental log synchronization
//!
//! Consumes an ordered sequence of JSON Patch envelopes describing a growing
//! log and keeps a locally consistent materialized view:
//! - [`PatchEnvelope`]: one batch of operations plus stream control signals
//! - [`Transport`]: the ordered, push-based channel per subject
//! - [`LogSynchronizer`]: one subscription per consumer, atomic application
//! - [`project`]: keyed, classified view entries for incremental rendering
//!
//! # Example
//!
//! ```rust,ignore
//! use revmon_stream::{ChannelTransport, LogSynchronizer, SyncEvent};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ChannelTransport::default());
//! let sync = LogSynchronizer::new(transport);
//!
//! let handle = sync.open("exec-1").await?;
//! let mut events = handle.take_events().expect("fresh handle");
//! while let Some(SyncEvent::Updated(update)) = events.recv().await {
//!     println!("{} entries ({:?})", update.len, update.hint);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod entry;
pub mod envelope;
pub mod error;
pub mod projection;
pub mod synchronizer;
pub mod transport;

pub use entry::{LogEntry, LogEntryKind};
pub use envelope::{PatchEnvelope, ENTRIES_POINTER};
pub use error::StreamError;
pub use projection::{project, sequence_key, ViewEntry};
pub use synchronizer::{
    LogSynchronizer, MaterializedUpdate, ScrollHint, SubscriptionHandle, SubscriptionId,
    SyncEvent,
};
pub use transport::{ChannelTransport, EnvelopeReceiver, Transport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the log stream
    pub use crate::{
        ChannelTransport, LogEntry, LogSynchronizer, PatchEnvelope, ScrollHint,
        SubscriptionHandle, SyncEvent, Transport, ViewEntry,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
