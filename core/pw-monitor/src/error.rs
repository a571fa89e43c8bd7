//! Error types for pw-monitor operations.
//!
//! Only process and thread spawning is reported back to the caller. Everything
//! that goes wrong once the pipeline is running ends the worker instead.

// ═══════════════════════════════════════════════════════════════════════════════
// Framing
// ═══════════════════════════════════════════════════════════════════════════════

/// Terminal conditions of the snapshot framer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Failed to read snapshot feed: {0}")]
    Read(#[from] std::io::Error),

    #[error("Snapshot buffer exceeded {limit} bytes without a complete document")]
    Oversized { limit: usize },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Monitor lifecycle
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to spawn producer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Producer `{command}` has no stdout pipe")]
    MissingStdout { command: String },

    #[error("Failed to spawn monitor worker thread: {0}")]
    Worker(#[source] std::io::Error),
}

/// Convenience type alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;
