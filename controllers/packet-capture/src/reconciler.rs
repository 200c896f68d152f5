//! Reconciliation logic for Pod capture annotations.
//!
//! Compares the capture annotation declared on a Pod with the session
//! registry and starts, stops, or restarts tcpdump to match:
//!
//! | annotated | running | action                  |
//! |-----------|---------|-------------------------|
//! | yes       | no      | start                   |
//! | no        | yes     | stop                    |
//! | yes       | yes     | restart (stop + start)  |
//! | no        | no      | nothing                 |
//!
//! The registry lock is held for the whole decision, so actions for a Pod
//! never interleave even if events are delivered concurrently.

use crate::error::ControllerError;
use crate::events::{WorkloadEvent, WorkloadSnapshot};
use crate::registry::{SessionRegistry, Sessions};
use crate::supervisor::ProcessSupervisor;
use capture_runtime::PacketLimit;
use tracing::{debug, error, info, warn};

/// What a reconcile call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Pod belongs to another node
    Ignored,
    /// Desired and actual state already match
    NoOp,
    /// A capture was started
    Started(PacketLimit),
    /// A capture was stopped
    Stopped,
    /// A capture was stopped and started again
    Restarted(PacketLimit),
    /// A start was requested but did not happen (invalid annotation, no IP,
    /// or launch failure). `stopped` is set when the previous session was
    /// torn down first as part of a restart.
    StartFailed {
        /// A previous session was stopped
        stopped: bool,
    },
}

/// Reconciles Pods scheduled to this node against running captures.
#[derive(Debug)]
pub struct Reconciler {
    node_name: String,
    annotation_key: String,
    registry: SessionRegistry,
    supervisor: ProcessSupervisor,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        node_name: impl Into<String>,
        annotation_key: impl Into<String>,
        registry: SessionRegistry,
        supervisor: ProcessSupervisor,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            annotation_key: annotation_key.into(),
            registry,
            supervisor,
        }
    }

    /// Session registry shared with this reconciler
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Routes a workload event: Added/Updated reconcile the new state,
    /// Deleted stops any capture of the Pod.
    pub fn dispatch(&self, event: &WorkloadEvent) -> Action {
        match event {
            WorkloadEvent::Added(snapshot) => self.reconcile(snapshot),
            WorkloadEvent::Updated { old, new } => {
                let before = old.annotation(&self.annotation_key);
                let after = new.annotation(&self.annotation_key);
                if before != after {
                    debug!("Capture annotation on pod {} changed: {:?} -> {:?}", new.qualified_name(), before, after);
                }
                self.reconcile(new)
            }
            WorkloadEvent::Deleted(snapshot) => self.on_removed(&snapshot.uid, &snapshot.name),
        }
    }

    /// Reconciles a Pod after an add or update.
    ///
    /// Pods scheduled to other nodes are ignored.
    pub fn reconcile(&self, snapshot: &WorkloadSnapshot) -> Action {
        if !snapshot.is_on_node(&self.node_name) {
            debug!("Ignoring pod {} on node {:?}", snapshot.qualified_name(), snapshot.node_name);
            return Action::Ignored;
        }

        let mut sessions = self.registry.lock();
        let requested = snapshot.annotation(&self.annotation_key);
        let running = sessions.contains(&snapshot.uid);

        match (requested, running) {
            (Some(value), false) => match parse_limit(snapshot, value) {
                Some(limit) if self.start(&mut sessions, snapshot, limit) => Action::Started(limit),
                _ => Action::StartFailed { stopped: false },
            },
            (None, true) => {
                info!("Capture annotation removed from pod {}, stopping capture", snapshot.qualified_name());
                self.supervisor.stop(&mut sessions, &snapshot.uid, &snapshot.name);
                Action::Stopped
            }
            (Some(value), true) => {
                let limit = parse_limit(snapshot, value);
                match limit {
                    Some(limit) => info!("Restarting capture for pod {} (N={})", snapshot.qualified_name(), limit),
                    None => info!("Stopping capture for pod {}, new value is invalid", snapshot.qualified_name()),
                }
                self.supervisor.stop(&mut sessions, &snapshot.uid, &snapshot.name);
                match limit {
                    Some(limit) if self.start(&mut sessions, snapshot, limit) => Action::Restarted(limit),
                    _ => Action::StartFailed { stopped: true },
                }
            }
            (None, false) => Action::NoOp,
        }
    }

    /// Handles deletion of a Pod: stops its capture regardless of annotations.
    pub fn on_removed(&self, workload_uid: &str, workload_name: &str) -> Action {
        let mut sessions = self.registry.lock();
        if !sessions.contains(workload_uid) {
            return Action::NoOp;
        }

        info!("Pod {} deleted, stopping capture", workload_name);
        self.supervisor.stop(&mut sessions, workload_uid, workload_name);
        Action::Stopped
    }

    fn start(&self, sessions: &mut Sessions, snapshot: &WorkloadSnapshot, limit: PacketLimit) -> bool {
        match self.supervisor.start(
            sessions,
            &snapshot.uid,
            &snapshot.name,
            snapshot.pod_ip.as_deref(),
            limit,
        ) {
            Ok(()) => true,
            Err(e @ (ControllerError::MissingPodIp(_) | ControllerError::InvalidPodIp { .. })) => {
                warn!("{}, cannot start capture yet", e);
                false
            }
            Err(e) => {
                error!("Failed to start tcpdump for pod {}: {}", snapshot.qualified_name(), e);
                false
            }
        }
    }
}

fn parse_limit(snapshot: &WorkloadSnapshot, value: &str) -> Option<PacketLimit> {
    PacketLimit::parse(value)
        .inspect_err(|e| warn!("Invalid number of packets for pod {}: {}", snapshot.qualified_name(), e))
        .ok()
}
