//! Workload events.
//!
//! Converts the raw Pod watch stream into strongly-typed
//! Added/Updated/Deleted events carrying `WorkloadSnapshot`s. This is the
//! only place that looks at `Pod` objects; everything downstream works on
//! snapshots.

use k8s_openapi::api::core::v1::Pod;
use kube_runtime::watcher;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Read-only view of a Pod at the time of a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    /// Pod UID, stable for the Pod's lifetime
    pub uid: String,
    /// Pod name, used to name capture artifacts
    pub name: String,
    /// Pod namespace
    pub namespace: Option<String>,
    /// Node the Pod is scheduled to
    pub node_name: Option<String>,
    /// `status.podIP`, unset until the Pod is running
    pub pod_ip: Option<String>,
    /// `metadata.resourceVersion`
    pub resource_version: Option<String>,
    /// Pod annotations
    pub annotations: BTreeMap<String, String>,
}

impl WorkloadSnapshot {
    /// Builds a snapshot from a Pod. Returns `None` for Pods without a UID or name.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let meta = &pod.metadata;
        let uid = meta.uid.clone()?;
        let name = meta.name.clone()?;

        Some(Self {
            uid,
            name,
            namespace: meta.namespace.clone(),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            pod_ip: pod
                .status
                .as_ref()
                .and_then(|s| s.pod_ip.clone())
                .filter(|ip| !ip.is_empty()),
            resource_version: meta.resource_version.clone(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        })
    }

    /// Value of annotation `key`, if present.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// True if the Pod is scheduled to `node_name`.
    pub fn is_on_node(&self, node_name: &str) -> bool {
        self.node_name.as_deref() == Some(node_name)
    }

    /// `namespace/name` for log messages.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Pod lifecycle event delivered to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    /// First sighting of a Pod
    Added(WorkloadSnapshot),
    /// A known Pod changed revision
    Updated {
        /// Previously seen state
        old: WorkloadSnapshot,
        /// Current state
        new: WorkloadSnapshot,
    },
    /// Pod is gone
    Deleted(WorkloadSnapshot),
}

/// Tracks the last seen revision of every Pod so watch notifications can be
/// turned into [`WorkloadEvent`]s.
///
/// Re-applies of an unchanged resource version are dropped. After a relist
/// (`Init` .. `InitDone`), Pods that were known before but did not show up
/// again are reported as deleted.
///
/// Events from a relist are held back until `InitDone` and emitted after the
/// deletions, so a Pod recreated under the same name while the watch was
/// down is stopped before its replacement starts.
#[derive(Debug, Default)]
pub struct EventTranslator {
    known: HashMap<String, WorkloadSnapshot>,
    relist: Option<Relist>,
}

#[derive(Debug, Default)]
struct Relist {
    seen: HashSet<String>,
    pending: Vec<WorkloadEvent>,
}

impl EventTranslator {
    /// Creates an empty translator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Pods currently tracked
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Translates one watch notification.
    pub fn translate(&mut self, event: watcher::Event<Pod>) -> Vec<WorkloadEvent> {
        match event {
            watcher::Event::Apply(pod) => self.apply(&pod).into_iter().collect(),
            watcher::Event::InitApply(pod) => {
                let event = self.apply(&pod);
                match self.relist.as_mut() {
                    Some(relist) => {
                        if let Some(uid) = pod.metadata.uid.as_ref() {
                            relist.seen.insert(uid.clone());
                        }
                        relist.pending.extend(event);
                        Vec::new()
                    }
                    None => event.into_iter().collect(),
                }
            }
            watcher::Event::Delete(pod) => self.delete(&pod).into_iter().collect(),
            watcher::Event::Init => {
                self.relist = Some(Relist::default());
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn apply(&mut self, pod: &Pod) -> Option<WorkloadEvent> {
        let Some(new) = WorkloadSnapshot::from_pod(pod) else {
            debug!("Ignoring Pod without uid or name: {:?}", pod.metadata.name);
            return None;
        };

        match self.known.insert(new.uid.clone(), new.clone()) {
            None => Some(WorkloadEvent::Added(new)),
            Some(old) if old.resource_version == new.resource_version => {
                debug!("Pod {} unchanged at revision {:?}", new.qualified_name(), new.resource_version);
                None
            }
            Some(old) => Some(WorkloadEvent::Updated { old, new }),
        }
    }

    fn delete(&mut self, pod: &Pod) -> Option<WorkloadEvent> {
        let Some(snapshot) = WorkloadSnapshot::from_pod(pod) else {
            debug!("Ignoring deleted Pod without uid or name: {:?}", pod.metadata.name);
            return None;
        };
        self.known.remove(&snapshot.uid);
        Some(WorkloadEvent::Deleted(snapshot))
    }

    fn finish_relist(&mut self) -> Vec<WorkloadEvent> {
        let Some(Relist { seen, pending }) = self.relist.take() else {
            return Vec::new();
        };

        let stale: Vec<String> = self
            .known
            .keys()
            .filter(|uid| !seen.contains(*uid))
            .cloned()
            .collect();

        // Deletions go first; a recreated Pod may reuse the name of a stale one
        stale
            .into_iter()
            .filter_map(|uid| self.known.remove(&uid))
            .map(WorkloadEvent::Deleted)
            .chain(pending)
            .collect()
    }
}
