//! Capture runtime errors

use thiserror::Error;

/// Errors that can occur while launching or controlling a capture process
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Requested packet/file count is not a positive integer
    #[error("Invalid packet limit {value:?}: {reason}")]
    InvalidPacketLimit {
        /// Raw annotation value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The capture binary could not be started
    #[error("Failed to launch {binary}: {source}")]
    Launch {
        /// Binary that was executed
        binary: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The spawned process did not report a PID (already reaped)
    #[error("Capture process for {0} exited before a PID could be read")]
    MissingPid(String),

    /// Launch attempted outside of a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    Runtime(String),

    /// Termination signal could not be delivered
    #[error("Failed to signal capture process {pid}: {source}")]
    Signal {
        /// Target process ID
        pid: u32,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
