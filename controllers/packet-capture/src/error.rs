//! Controller-specific error types.
//!
//! This module defines error types specific to the Packet Capture Controller
//! that are not covered by upstream library errors.

use capture_runtime::CaptureError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Packet Capture Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Capture process or artifact error
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pod has no IP assigned yet
    #[error("Pod {0} has no IP assigned")]
    MissingPodIp(String),

    /// Pod IP could not be parsed
    #[error("Pod {pod} has an invalid IP {ip:?}")]
    InvalidPodIp {
        /// Pod name
        pod: String,
        /// Raw `status.podIP` value
        ip: String,
    },

    /// Pod already has a capture session
    #[error("Pod {0} already has a capture session")]
    SessionExists(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
