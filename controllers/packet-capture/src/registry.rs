//! Session registry.
//!
//! Maps Pod UID to the capture session running for it. The map lives behind
//! a single mutex owned by `SessionRegistry`; callers take the lock once per
//! reconcile decision and pass the guarded `Sessions` to the supervisor, so
//! check and act happen under the same lock.

use capture_runtime::{PacketLimit, RunningCapture};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One running capture bound to one Pod.
#[derive(Debug)]
pub struct CaptureSession {
    /// Pod UID (registry key)
    pub workload_uid: String,
    /// Pod name, used to find artifacts
    pub workload_name: String,
    /// Rotation file count tcpdump was started with
    pub packet_limit: PacketLimit,
    /// Launch time
    pub started_at: DateTime<Utc>,
    process: Box<dyn RunningCapture>,
}

impl CaptureSession {
    /// Creates a session owning `process`.
    pub fn new(
        workload_uid: impl Into<String>,
        workload_name: impl Into<String>,
        packet_limit: PacketLimit,
        process: Box<dyn RunningCapture>,
    ) -> Self {
        Self {
            workload_uid: workload_uid.into(),
            workload_name: workload_name.into(),
            packet_limit,
            started_at: Utc::now(),
            process,
        }
    }

    /// PID of the capture process
    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// True if the process has already exited on its own
    pub fn has_exited(&self) -> bool {
        self.process.has_exited()
    }

    /// Releases the process handle, consuming the session.
    pub fn into_process(self) -> Box<dyn RunningCapture> {
        self.process
    }

    /// Read-only view for logging and inspection.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            workload_uid: self.workload_uid.clone(),
            workload_name: self.workload_name.clone(),
            packet_limit: self.packet_limit.get(),
            pid: self.pid(),
            started_at: self.started_at,
            exited: self.has_exited(),
        }
    }
}

/// Snapshot of a session's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Pod UID
    pub workload_uid: String,
    /// Pod name
    pub workload_name: String,
    /// Rotation file count
    pub packet_limit: u32,
    /// Capture process PID
    pub pid: u32,
    /// Launch time
    pub started_at: DateTime<Utc>,
    /// Process has exited on its own
    pub exited: bool,
}

/// The UID → session map. Only reachable through [`SessionRegistry::lock`].
#[derive(Debug, Default)]
pub struct Sessions {
    by_uid: HashMap<String, CaptureSession>,
}

impl Sessions {
    /// True if a session exists for `uid`
    pub fn contains(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    /// Session for `uid`
    #[cfg(test)]
    pub fn get(&self, uid: &str) -> Option<&CaptureSession> {
        self.by_uid.get(uid)
    }

    /// True if any session captures a Pod called `workload_name`.
    ///
    /// Pods in different namespaces, or a Pod and its recreated successor,
    /// can share a name and with it their capture files.
    pub fn has_workload_named(&self, workload_name: &str) -> bool {
        self.by_uid.values().any(|s| s.workload_name == workload_name)
    }

    /// Registers `session`. If the UID already has a session the map is left
    /// untouched and the new session is handed back.
    pub fn insert(&mut self, session: CaptureSession) -> Result<(), CaptureSession> {
        match self.by_uid.entry(session.workload_uid.clone()) {
            Entry::Occupied(_) => Err(session),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Removes and returns the session for `uid`
    pub fn remove(&mut self, uid: &str) -> Option<CaptureSession> {
        self.by_uid.remove(uid)
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    /// True if no session is registered
    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    /// Summaries of all sessions, sorted by Pod name
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self.by_uid.values().map(CaptureSession::summary).collect();
        summaries.sort_by(|a, b| a.workload_name.cmp(&b.workload_name));
        summaries
    }
}

/// Shared, lock-guarded session map. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Sessions>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the registry lock.
    ///
    /// A panic while holding the lock cannot leave the map half-updated (every
    /// mutation is a single map operation), so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no session is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True if a session exists for `uid`
    #[cfg(test)]
    pub fn contains(&self, uid: &str) -> bool {
        self.lock().contains(uid)
    }

    /// Summaries of all sessions
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.lock().summaries()
    }
}
