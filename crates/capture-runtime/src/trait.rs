//! CaptureRunner trait for mocking
//!
//! This trait abstracts process launching so the controller's decision logic
//! can be unit tested without spawning tcpdump. `TcpdumpRunner` is the real
//! implementation; `MockCaptureRunner` (feature `test-util`) records calls.

use crate::command::CaptureCommand;
use crate::error::CaptureError;
use std::fmt;

/// Launches capture processes.
pub trait CaptureRunner: Send + Sync {
    /// Starts the process described by `command`.
    ///
    /// Returns the owning handle on success. Exit of the process is observed
    /// by the runner in the background; the handle reports it via
    /// [`RunningCapture::has_exited`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be launched.
    fn launch(&self, command: &CaptureCommand) -> Result<Box<dyn RunningCapture>, CaptureError>;
}

/// Ownership of one launched capture process.
pub trait RunningCapture: Send + Sync + fmt::Debug {
    /// OS process ID
    fn pid(&self) -> u32;

    /// True once the background observer has seen the process exit.
    fn has_exited(&self) -> bool;

    /// Sends the termination signal. Does not wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal could not be delivered.
    fn terminate(&mut self) -> Result<(), CaptureError>;
}
