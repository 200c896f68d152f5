//! tcpdump process runner.
//!
//! Spawns the capture binary with `tokio::process` and hands the child to a
//! detached observer task. The returned handle keeps only the PID, an
//! `exited` flag, and a channel for kill requests. Only the observer signals
//! or reaps the child, so a kill can never reach a recycled PID. The observer
//! logs the exit status and flips the flag; it never touches controller state.

use crate::command::CaptureCommand;
use crate::error::CaptureError;
use crate::runner_trait::{CaptureRunner, RunningCapture};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Runs tcpdump (or whatever binary the command names) as a child process.
///
/// Must be used from within a Tokio runtime. Captures are stopped with
/// SIGKILL (`Child::start_kill`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpdumpRunner;

impl TcpdumpRunner {
    /// Creates a new runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CaptureRunner for TcpdumpRunner {
    fn launch(&self, command: &CaptureCommand) -> Result<Box<dyn RunningCapture>, CaptureError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::Runtime(e.to_string()))?;
        let workload_name = command.workload_name().to_string();

        let mut child = Command::new(command.binary())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| CaptureError::Launch {
                binary: command.binary().display().to_string(),
                source,
            })?;

        let pid = child
            .id()
            .ok_or_else(|| CaptureError::MissingPid(workload_name.clone()))?;

        if let Some(stderr) = child.stderr.take() {
            runtime.spawn(forward_stderr(stderr, workload_name.clone()));
        }

        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel();
        runtime.spawn(observe_exit(
            child,
            workload_name.clone(),
            pid,
            Arc::clone(&exited),
            kill_rx,
        ));

        debug!("Spawned {} for pod {} (pid {})", command.binary().display(), workload_name, pid);

        Ok(Box::new(TcpdumpProcess {
            pid,
            workload_name,
            exited,
            kill_tx: Some(kill_tx),
        }))
    }
}

/// Handle to a tcpdump child owned by its exit observer.
#[derive(Debug)]
pub struct TcpdumpProcess {
    pid: u32,
    workload_name: String,
    exited: Arc<AtomicBool>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl RunningCapture for TcpdumpProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Asks the observer to kill the child. A process that has already been
    /// reaped is left alone.
    fn terminate(&mut self) -> Result<(), CaptureError> {
        match self.kill_tx.take() {
            Some(kill_tx) => {
                if kill_tx.send(()).is_err() {
                    debug!("tcpdump for pod {} (pid {}) already exited", self.workload_name, self.pid);
                }
            }
            None => debug!("Kill already requested for tcpdump of pod {} (pid {})", self.workload_name, self.pid),
        }
        Ok(())
    }
}

async fn observe_exit(
    mut child: Child,
    workload_name: String,
    pid: u32,
    exited: Arc<AtomicBool>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let natural = tokio::select! {
        status = child.wait() => Some(status),
        Ok(()) = &mut kill_rx => None,
    };

    let status = match natural {
        Some(status) => status,
        None => {
            match child.start_kill() {
                Ok(()) => debug!("Sent SIGKILL to tcpdump for pod {} (pid {})", workload_name, pid),
                Err(e) => warn!("Failed to kill tcpdump for pod {} (pid {}): {}", workload_name, pid, e),
            }
            child.wait().await
        }
    };
    exited.store(true, Ordering::Release);

    match status {
        Ok(status) if status.success() => {
            info!("tcpdump for pod {} (pid {}) finished", workload_name, pid);
        }
        Ok(status) => {
            warn!("tcpdump for pod {} (pid {}) exited: {}", workload_name, pid, status);
        }
        Err(e) => {
            error!("Failed to wait for tcpdump for pod {} (pid {}): {}", workload_name, pid, e);
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, workload_name: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!("tcpdump stderr [{}]: {}", workload_name, line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading tcpdump stderr for pod {}: {}", workload_name, e);
                break;
            }
        }
    }
}
