//! Controller configuration.
//!
//! All settings come from environment variables. `NODE_NAME` is normally
//! injected through the downward API (`spec.nodeName`).

use crate::error::ControllerError;
use std::path::PathBuf;

/// Annotation that requests a capture; its value is the rotation file count.
pub const DEFAULT_ANNOTATION_KEY: &str = "tcpdump.antrea.io";

/// Directory capture files are written to.
pub const DEFAULT_CAPTURE_DIR: &str = "/captures";

/// Capture binary, resolved through `PATH`.
pub const DEFAULT_TCPDUMP_BIN: &str = "tcpdump";

/// Runtime configuration for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Node this instance owns
    pub node_name: String,
    /// Restrict the Pod watch to one namespace (all namespaces when `None`)
    pub namespace: Option<String>,
    /// Artifact directory
    pub capture_dir: PathBuf,
    /// Capture binary
    pub tcpdump_binary: PathBuf,
    /// Capture-control annotation key
    pub annotation_key: String,
}

impl ControllerConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values are treated as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let node_name = get("NODE_NAME").ok_or_else(|| {
            ControllerError::InvalidConfig("NODE_NAME environment variable must be set".to_string())
        })?;

        Ok(Self {
            node_name,
            namespace: get("WATCH_NAMESPACE"),
            capture_dir: get("CAPTURE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR), PathBuf::from),
            tcpdump_binary: get("TCPDUMP_BIN")
                .map_or_else(|| PathBuf::from(DEFAULT_TCPDUMP_BIN), PathBuf::from),
            annotation_key: get("CAPTURE_ANNOTATION")
                .unwrap_or_else(|| DEFAULT_ANNOTATION_KEY.to_string()),
        })
    }
}
