//! Mock CaptureRunner for unit testing
//!
//! Records every launch and termination in memory so tests can assert on the
//! exact sequence of process actions without spawning tcpdump. Failures can
//! be injected for both launching and signalling.

use crate::command::CaptureCommand;
use crate::error::CaptureError;
use crate::runner_trait::{CaptureRunner, RunningCapture};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A process action observed by the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A process was launched for the workload with this PID
    Launched {
        /// Fake PID
        pid: u32,
        /// Workload name from the command
        workload_name: String,
        /// Requested rotation count
        packet_limit: u32,
    },
    /// Termination was requested for this PID
    Terminated {
        /// Fake PID
        pid: u32,
    },
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    next_pid: u32,
    events: Vec<MockEvent>,
    commands: Vec<CaptureCommand>,
    exited: HashMap<u32, Arc<AtomicBool>>,
    fail_launches: bool,
    fail_signals: bool,
}

/// Mock runner for testing
#[derive(Debug, Clone, Default)]
pub struct MockCaptureRunner {
    pub(crate) state: Arc<Mutex<MockState>>,
}

impl MockCaptureRunner {
    /// Create a new mock runner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent launch fail
    pub fn set_fail_launches(&self, fail: bool) {
        self.state.lock().unwrap().fail_launches = fail;
    }

    /// Make every subsequent termination fail
    pub fn set_fail_signals(&self, fail: bool) {
        self.state.lock().unwrap().fail_signals = fail;
    }

    /// All recorded events in call order
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Commands passed to successful launches
    pub fn commands(&self) -> Vec<CaptureCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Number of successful launches
    pub fn launch_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Launched { .. }))
    }

    /// Number of termination requests
    pub fn terminate_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Terminated { .. }))
    }

    /// Number of launched processes for `workload_name` that are still alive
    pub fn running_for(&self, workload_name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Launched { pid, workload_name: name, .. } if name == workload_name => Some(pid),
                _ => None,
            })
            .filter(|pid| {
                state
                    .exited
                    .get(*pid)
                    .is_some_and(|flag| !flag.load(Ordering::Acquire))
            })
            .count()
    }

    /// Simulate the process exiting on its own (e.g. rotation limit reached)
    pub fn mark_exited(&self, pid: u32) {
        if let Some(flag) = self.state.lock().unwrap().exited.get(&pid) {
            flag.store(true, Ordering::Release);
        }
    }

    fn count(&self, pred: impl Fn(&MockEvent) -> bool) -> usize {
        self.state.lock().unwrap().events.iter().filter(|e| pred(e)).count()
    }
}

impl CaptureRunner for MockCaptureRunner {
    fn launch(&self, command: &CaptureCommand) -> Result<Box<dyn RunningCapture>, CaptureError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_launches {
            return Err(CaptureError::Launch {
                binary: command.binary().display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock launch failure"),
            });
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        let exited = Arc::new(AtomicBool::new(false));
        state.exited.insert(pid, Arc::clone(&exited));
        state.commands.push(command.clone());
        state.events.push(MockEvent::Launched {
            pid,
            workload_name: command.workload_name().to_string(),
            packet_limit: command.packet_limit().get(),
        });

        Ok(Box::new(MockCapture {
            pid,
            exited,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Handle returned by [`MockCaptureRunner`]
#[derive(Debug)]
pub struct MockCapture {
    pid: u32,
    exited: Arc<AtomicBool>,
    state: Arc<Mutex<MockState>>,
}

impl RunningCapture for MockCapture {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn terminate(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(MockEvent::Terminated { pid: self.pid });
        if state.fail_signals {
            return Err(CaptureError::Signal {
                pid: self.pid,
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.exited.store(true, Ordering::Release);
        Ok(())
    }
}
