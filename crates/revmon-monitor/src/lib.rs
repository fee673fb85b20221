//! Review Monitor - review state bound to live review logs
//!
//! Glues the lifecycle controller to the log synchronizer:
//! - [`ReviewMonitor`]: one bound attempt, reconciled log subscription
//! - [`watch_records`]: drives the monitor from record change notifications
//! - [`replay`]: offline replay of recorded runs, used by the `revmon` binary

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod monitor;
pub mod replay;

pub use error::MonitorError;
pub use monitor::{watch_records, ReviewMonitor};
pub use replay::{
    load_config, load_frames, load_records, render_entries, render_status, replay, ReplayReport,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the monitor
    pub use crate::{watch_records, MonitorError, ReviewMonitor};
    pub use revmon_lifecycle::prelude::*;
    pub use revmon_stream::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
