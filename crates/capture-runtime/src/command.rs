//! tcpdump invocation and artifact naming.
//!
//! A capture writes to `<capture-dir>/capture-<workload>.pcap`; with file
//! rotation enabled tcpdump appends a numeric suffix to that name
//! (`capture-web-0.pcap0`, `capture-web-0.pcap1`, ...). Both the command line
//! and the janitor derive file names from the helpers in this module so the
//! two can never disagree.

use crate::error::CaptureError;
use std::ffi::OsString;
use std::fmt;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// File name prefix shared by every capture artifact
pub const ARTIFACT_PREFIX: &str = "capture-";

/// Extension of the base capture file (before tcpdump's rotation suffix)
pub const ARTIFACT_EXTENSION: &str = "pcap";

/// Rotation threshold passed to `-C`, in millions of bytes
pub const ROTATE_SIZE_MB: u32 = 1;

/// Interface passed to `-i`
pub const CAPTURE_INTERFACE: &str = "any";

/// Number of rotated capture files a session may produce.
///
/// Always positive; constructed from the annotation value via [`PacketLimit::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketLimit(NonZeroU32);

impl PacketLimit {
    /// Parses a decimal annotation value.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidPacketLimit` for non-numeric, zero,
    /// negative, or out-of-range values.
    pub fn parse(value: &str) -> Result<Self, CaptureError> {
        let invalid = |reason: &str| CaptureError::InvalidPacketLimit {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let n = value
            .parse::<i64>()
            .map_err(|e| invalid(&format!("not a number ({e})")))?;
        if n <= 0 {
            return Err(invalid("must be greater than zero"));
        }
        let n = u32::try_from(n).map_err(|_| invalid("too large"))?;

        NonZeroU32::new(n)
            .map(Self)
            .ok_or_else(|| invalid("must be greater than zero"))
    }

    /// Returns the limit as a plain integer.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for PacketLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base artifact file name for a workload, e.g. `capture-web-0.pcap`.
#[must_use]
pub fn artifact_file_name(workload_name: &str) -> String {
    format!("{ARTIFACT_PREFIX}{workload_name}.{ARTIFACT_EXTENSION}")
}

/// Returns true if `file_name` was written by the capture of `workload_name`.
///
/// Matches the base file name optionally followed by digits only, so the
/// artifacts of `a` never match those of `a2` or `a.pcap`.
#[must_use]
pub fn is_artifact_of(file_name: &str, workload_name: &str) -> bool {
    file_name
        .strip_prefix(artifact_file_name(workload_name).as_str())
        .is_some_and(|suffix| suffix.bytes().all(|b| b.is_ascii_digit()))
}

/// A fully derived tcpdump invocation for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    binary: PathBuf,
    workload_name: String,
    ip: IpAddr,
    packet_limit: PacketLimit,
    output: PathBuf,
}

impl CaptureCommand {
    /// Builds the invocation for capturing traffic of `ip` into `capture_dir`.
    pub fn new(
        binary: impl Into<PathBuf>,
        capture_dir: &Path,
        workload_name: impl Into<String>,
        ip: IpAddr,
        packet_limit: PacketLimit,
    ) -> Self {
        let workload_name = workload_name.into();
        let output = capture_dir.join(artifact_file_name(&workload_name));
        Self {
            binary: binary.into(),
            workload_name,
            ip,
            packet_limit,
            output,
        }
    }

    /// Binary to execute
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Workload the capture belongs to
    #[must_use]
    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    /// Captured address
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Rotation file count
    #[must_use]
    pub fn packet_limit(&self) -> PacketLimit {
        self.packet_limit
    }

    /// Base output file
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// tcpdump arguments: `-C 1 -W <n> -w <output> -i any "host <ip>"`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-C".into(),
            ROTATE_SIZE_MB.to_string().into(),
            "-W".into(),
            self.packet_limit.to_string().into(),
            "-w".into(),
            self.output.clone().into_os_string(),
            "-i".into(),
            CAPTURE_INTERFACE.into(),
            format!("host {}", self.ip).into(),
        ]
    }
}
