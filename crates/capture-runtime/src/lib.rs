//! Capture Runtime
//!
//! Process-level building blocks for the packet capture controller:
//! deriving the tcpdump invocation for a Pod, launching and signalling the
//! process, and removing the capture files it leaves behind.
//!
//! # Example
//!
//! ```no_run
//! use capture_runtime::{
//!     ArtifactJanitor, CaptureCommand, CaptureRunner, PacketLimit, RunningCapture, TcpdumpRunner,
//! };
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limit = PacketLimit::parse("3")?;
//! let command = CaptureCommand::new("tcpdump", Path::new("/captures"), "web-0", "10.0.0.7".parse()?, limit);
//!
//! let mut capture = TcpdumpRunner::new().launch(&command)?;
//! capture.terminate()?;
//!
//! ArtifactJanitor::new("/captures").cleanup("web-0");
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod janitor;
#[path = "trait.rs"]
pub mod runner_trait;
pub mod tcpdump;
#[cfg(feature = "test-util")]
pub mod mock;

pub use command::{CaptureCommand, PacketLimit, artifact_file_name, is_artifact_of};
pub use error::CaptureError;
pub use janitor::ArtifactJanitor;
pub use runner_trait::{CaptureRunner, RunningCapture};
pub use tcpdump::{TcpdumpProcess, TcpdumpRunner};
#[cfg(feature = "test-util")]
pub use mock::{MockCaptureRunner, MockEvent};
