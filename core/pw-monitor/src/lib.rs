//! # pw-monitor
//!
//! Turns the `pw-dump -m` snapshot feed into stream start/stop notifications.
//!
//! ## Pipeline
//!
//! ```text
//! pw-dump -m → framer → classify → reconcile → StreamSink
//!   (bytes)   (documents) (nodes)   (events)   (callbacks)
//! ```
//!
//! - [`framer`]: finds snapshot boundaries in the unframed byte stream
//! - [`classify`]: keeps audio output streams and sinks
//! - [`reconcile`]: diffs snapshots into start/stop events
//! - [`monitor`]: child process, worker thread and shutdown
//!
//! ## Design Principles
//!
//! - **One worker thread**: reconciler state is only touched by the worker.
//! - **No persistence**: every `start` begins with empty state.
//! - **Best effort parsing**: malformed records and documents are skipped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pw_monitor::{MonitorConfig, StreamMonitor};
//!
//! let mut monitor = StreamMonitor::new(MonitorConfig::default(), sink);
//! monitor.start()?;
//! // ...
//! monitor.stop();
//! ```

pub mod classify;
pub mod error;
pub mod framer;
pub mod monitor;
pub mod reconcile;
pub mod sink;
pub mod types;

pub use classify::classify;
pub use error::{FrameError, MonitorError, Result};
pub use framer::{FrameBuffer, SnapshotFrames};
pub use monitor::{MonitorConfig, StreamMonitor};
pub use reconcile::{transition, Presence, Reconciler, Transition};
pub use sink::StreamSink;
pub use types::*;
