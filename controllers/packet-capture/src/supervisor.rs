//! Capture process supervision.
//!
//! Starts tcpdump for a Pod and registers the session, or tears a session
//! down: signal the process, drop the registry entry, remove its files.
//! Both operations take the already-locked `Sessions` so the caller decides
//! how long the lock is held.

use crate::error::ControllerError;
use crate::registry::{CaptureSession, Sessions};
use capture_runtime::{ArtifactJanitor, CaptureCommand, CaptureRunner, PacketLimit};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Launches and stops capture processes on behalf of the reconciler.
pub struct ProcessSupervisor {
    runner: Arc<dyn CaptureRunner>,
    janitor: ArtifactJanitor,
    tcpdump_binary: PathBuf,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("janitor", &self.janitor)
            .field("tcpdump_binary", &self.tcpdump_binary)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor launching `tcpdump_binary` through `runner`.
    pub fn new(
        runner: Arc<dyn CaptureRunner>,
        janitor: ArtifactJanitor,
        tcpdump_binary: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            janitor,
            tcpdump_binary: tcpdump_binary.into(),
        }
    }

    /// Starts a capture of all traffic to and from `ip` and registers it.
    ///
    /// Nothing is registered if the Pod has no usable IP yet or the process
    /// cannot be launched.
    pub fn start(
        &self,
        sessions: &mut Sessions,
        workload_uid: &str,
        workload_name: &str,
        ip: Option<&str>,
        packet_limit: PacketLimit,
    ) -> Result<(), ControllerError> {
        if sessions.contains(workload_uid) {
            return Err(ControllerError::SessionExists(workload_name.to_string()));
        }

        let raw_ip = ip.ok_or_else(|| ControllerError::MissingPodIp(workload_name.to_string()))?;
        let ip: IpAddr = raw_ip.parse().map_err(|_| ControllerError::InvalidPodIp {
            pod: workload_name.to_string(),
            ip: raw_ip.to_string(),
        })?;

        let command = CaptureCommand::new(
            &self.tcpdump_binary,
            self.janitor.capture_dir(),
            workload_name,
            ip,
            packet_limit,
        );
        let process = self.runner.launch(&command)?;
        let pid = process.pid();

        let session = CaptureSession::new(workload_uid, workload_name, packet_limit, process);
        if let Err(duplicate) = sessions.insert(session) {
            error!("Pod {} gained a capture session during launch, killing tcpdump (pid {})", workload_name, pid);
            if let Err(e) = duplicate.into_process().terminate() {
                warn!("Failed to kill tcpdump for pod {}: {}", workload_name, e);
            }
            return Err(ControllerError::SessionExists(workload_name.to_string()));
        }

        info!(
            "Started tcpdump for pod {} (N={}, pid {}, output {})",
            workload_name,
            packet_limit,
            pid,
            command.output().display()
        );
        Ok(())
    }

    /// Stops the capture registered for `workload_uid`, if any.
    ///
    /// Sends the termination signal without waiting for the process to exit,
    /// removes the registry entry, then deletes the Pod's capture files unless
    /// another registered session uses the same Pod name. A failed signal is
    /// logged and does not prevent the rest. Returns true if a session was
    /// stopped.
    pub fn stop(&self, sessions: &mut Sessions, workload_uid: &str, workload_name: &str) -> bool {
        let Some(session) = sessions.remove(workload_uid) else {
            return false;
        };

        let pid = session.pid();
        let mut process = session.into_process();
        if process.has_exited() {
            info!("tcpdump for pod {} (pid {}) had already exited", workload_name, pid);
        } else if let Err(e) = process.terminate() {
            warn!("Failed to kill tcpdump for pod {}: {}", workload_name, e);
        }
        drop(process);

        if sessions.has_workload_named(workload_name) {
            info!(
                "Stopped capture for pod {}, keeping files still written by another capture of that name",
                workload_name
            );
            return true;
        }

        let removed = self.janitor.cleanup(workload_name);
        info!("Stopped capture and cleaned up {} file(s) for pod {}", removed, workload_name);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_runtime::{MockCaptureRunner, MockEvent};

    fn supervisor(runner: &MockCaptureRunner, dir: &std::path::Path) -> ProcessSupervisor {
        ProcessSupervisor::new(Arc::new(runner.clone()), ArtifactJanitor::new(dir), "tcpdump")
    }

    fn limit(n: &str) -> PacketLimit {
        PacketLimit::parse(n).unwrap()
    }

    #[test]
    fn test_start_registers_session() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();

        supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("4"))
            .unwrap();

        let session = sessions.get("uid-1").unwrap();
        assert_eq!(session.workload_name, "web-0");
        assert_eq!(session.packet_limit.get(), 4);

        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].output(), dir.path().join("capture-web-0.pcap"));
        assert_eq!(commands[0].ip().to_string(), "10.0.0.7");
    }

    #[test]
    fn test_start_without_ip_is_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();

        let err = supervisor
            .start(&mut sessions, "uid-1", "web-0", None, limit("4"))
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingPodIp(_)));

        let err = supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("not-an-ip"), limit("4"))
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidPodIp { .. }));

        assert!(sessions.is_empty());
        assert_eq!(runner.launch_count(), 0);
    }

    #[test]
    fn test_start_launch_failure_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        runner.set_fail_launches(true);
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();

        let err = supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("4"))
            .unwrap_err();
        assert!(matches!(err, ControllerError::Capture(_)));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_start_refuses_existing_session() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();

        supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("4"))
            .unwrap();
        let err = supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("5"))
            .unwrap_err();

        assert!(matches!(err, ControllerError::SessionExists(_)));
        assert_eq!(runner.launch_count(), 1);
        assert_eq!(sessions.get("uid-1").unwrap().packet_limit.get(), 4);
    }

    #[test]
    fn test_stop_signals_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capture-web-0.pcap0"), b"x").unwrap();
        std::fs::write(dir.path().join("capture-web-0.pcap1"), b"x").unwrap();

        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();
        supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("2"))
            .unwrap();

        assert!(supervisor.stop(&mut sessions, "uid-1", "web-0"));
        assert!(sessions.is_empty());
        assert_eq!(runner.terminate_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capture-web-0.pcap0"), b"x").unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();

        assert!(!supervisor.stop(&mut sessions, "uid-1", "web-0"));
        assert!(runner.events().is_empty());
        // Files of an unknown session are not touched
        assert!(dir.path().join("capture-web-0.pcap0").exists());
    }

    #[test]
    fn test_stop_proceeds_when_signal_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capture-web-0.pcap0"), b"x").unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();
        supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("2"))
            .unwrap();

        runner.set_fail_signals(true);
        assert!(supervisor.stop(&mut sessions, "uid-1", "web-0"));
        assert!(sessions.is_empty());
        assert!(!dir.path().join("capture-web-0.pcap0").exists());
    }

    #[test]
    fn test_stop_keeps_files_shared_with_live_session() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();
        supervisor
            .start(&mut sessions, "uid-old", "web-0", Some("10.0.0.7"), limit("2"))
            .unwrap();
        supervisor
            .start(&mut sessions, "uid-new", "web-0", Some("10.0.0.8"), limit("2"))
            .unwrap();
        std::fs::write(dir.path().join("capture-web-0.pcap0"), b"x").unwrap();

        assert!(supervisor.stop(&mut sessions, "uid-old", "web-0"));
        assert_eq!(runner.terminate_count(), 1);
        assert!(dir.path().join("capture-web-0.pcap0").exists());

        // Last capture of that name cleans up
        assert!(supervisor.stop(&mut sessions, "uid-new", "web-0"));
        assert!(!dir.path().join("capture-web-0.pcap0").exists());
    }

    #[test]
    fn test_stop_skips_signal_for_exited_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCaptureRunner::new();
        let supervisor = supervisor(&runner, dir.path());
        let mut sessions = Sessions::default();
        supervisor
            .start(&mut sessions, "uid-1", "web-0", Some("10.0.0.7"), limit("2"))
            .unwrap();

        let pid = sessions.get("uid-1").unwrap().pid();
        runner.mark_exited(pid);
        // Natural exit leaves the session registered
        assert!(sessions.contains("uid-1"));

        assert!(supervisor.stop(&mut sessions, "uid-1", "web-0"));
        assert_eq!(runner.terminate_count(), 0);
        assert_eq!(
            runner.events(),
            [MockEvent::Launched {
                pid,
                workload_name: "web-0".to_string(),
                packet_limit: 2,
            }]
        );
    }
}
